use actix_web::error::InternalError;
use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};

use markov_core::{Engine, GenerationRequest, MAX_GENERATION_LENGTH, MAX_ORDER, MIN_ORDER, MarkovError};

/// Shortest accepted training text, in characters.
pub const MIN_TEXT_CHARS: usize = 50;
/// Shortest accepted generation length, in words.
pub const MIN_LENGTH: usize = 10;
/// Longest accepted start text, in characters.
pub const MAX_START_CHARS: usize = 500;

const DEFAULT_ORDER: usize = 2;
const DEFAULT_LENGTH: usize = 50;

fn default_order() -> usize {
	DEFAULT_ORDER
}

fn default_length() -> usize {
	DEFAULT_LENGTH
}

/// Body of `POST /api/markov/train`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainBody {
	#[serde(default = "default_order")]
	order: usize,
	text: String,
}

/// Body of `POST /api/markov/generate`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
	start_text: Option<String>,
	#[serde(default = "default_length")]
	length: usize,
	#[serde(default = "default_order")]
	order: usize,
	seed: Option<u64>,
}

/// Envelope of every JSON response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
	success: bool,
	message: String,
	data: Option<T>,
}

impl<T> ApiResponse<T> {
	fn ok(message: impl Into<String>, data: T) -> Self {
		Self { success: true, message: message.into(), data: Some(data) }
	}
}

impl ApiResponse<()> {
	fn error(message: impl Into<String>) -> Self {
		Self { success: false, message: message.into(), data: None }
	}
}

fn check_order(order: usize) -> Result<(), String> {
	if (MIN_ORDER..=MAX_ORDER).contains(&order) {
		Ok(())
	} else {
		Err(format!("order must be between {MIN_ORDER} and {MAX_ORDER}"))
	}
}

impl TrainBody {
	fn validate(&self) -> Result<(), String> {
		check_order(self.order)?;
		if self.text.trim().is_empty() {
			return Err("text is required".into());
		}
		if self.text.chars().count() < MIN_TEXT_CHARS {
			return Err(format!("text must be at least {MIN_TEXT_CHARS} characters"));
		}
		Ok(())
	}
}

impl GenerateBody {
	fn validate(&self) -> Result<(), String> {
		check_order(self.order)?;
		if !(MIN_LENGTH..=MAX_GENERATION_LENGTH).contains(&self.length) {
			return Err(format!("length must be between {MIN_LENGTH} and {MAX_GENERATION_LENGTH}"));
		}
		if self.start_text.as_ref().is_some_and(|s| s.chars().count() > MAX_START_CHARS) {
			return Err(format!("startText must be at most {MAX_START_CHARS} characters"));
		}
		Ok(())
	}

	fn into_request(self) -> GenerationRequest {
		GenerationRequest {
			start_text: self.start_text,
			length: self.length,
			order: Some(self.order),
			seed: self.seed,
		}
	}
}

fn bad_request(message: String) -> HttpResponse {
	log::warn!("rejected request: {message}");
	HttpResponse::BadRequest().json(ApiResponse::error(message))
}

fn engine_error(error: &MarkovError) -> HttpResponse {
	let mut builder = match error {
		MarkovError::InvalidInput(_) => HttpResponse::BadRequest(),
		MarkovError::NotTrained => HttpResponse::Conflict(),
		MarkovError::BackendUnavailable(_) | MarkovError::Build(_) => {
			log::error!("engine failure: {error}");
			HttpResponse::InternalServerError()
		}
	};
	builder.json(ApiResponse::error(error.to_string()))
}

fn blocking_error(error: actix_web::error::BlockingError) -> HttpResponse {
	log::error!("engine call aborted: {error}");
	HttpResponse::InternalServerError().json(ApiResponse::error("engine call aborted"))
}

/// HTTP POST endpoint `/api/markov/train`
///
/// Trains a new model and replaces the current one. The build runs on the
/// blocking pool so the workers keep serving status and health.
#[post("/api/markov/train")]
async fn train(engine: web::Data<Engine>, body: web::Json<TrainBody>) -> impl Responder {
	let body = body.into_inner();
	if let Err(e) = body.validate() {
		return bad_request(e);
	}

	let engine = engine.clone();
	match web::block(move || engine.train(&body.text, body.order)).await {
		Ok(Ok(stats)) => HttpResponse::Ok().json(ApiResponse::ok("model trained", stats)),
		Ok(Err(e)) => engine_error(&e),
		Err(e) => blocking_error(e),
	}
}

/// HTTP POST endpoint `/api/markov/generate`
///
/// Generates text from the current model, waiting for an in-flight
/// training if there is one.
#[post("/api/markov/generate")]
async fn generate(engine: web::Data<Engine>, body: web::Json<GenerateBody>) -> impl Responder {
	let body = body.into_inner();
	if let Err(e) = body.validate() {
		return bad_request(e);
	}

	let request = body.into_request();
	let engine = engine.clone();
	match web::block(move || engine.generate(&request)).await {
		Ok(Ok(generated)) => {
			let message = if generated.order_mismatch {
				format!("text generated with the trained order {}", generated.used_order)
			} else {
				"text generated".to_owned()
			};
			HttpResponse::Ok().json(ApiResponse::ok(message, generated))
		}
		Ok(Err(e)) => engine_error(&e),
		Err(e) => blocking_error(e),
	}
}

#[get("/api/markov/status")]
async fn status(engine: web::Data<Engine>) -> impl Responder {
	HttpResponse::Ok().json(ApiResponse::ok("model status", engine.status()))
}

#[get("/api/markov/health")]
async fn health(engine: web::Data<Engine>) -> impl Responder {
	let health = engine.health();
	let mode = if health.native_integration { "with the native library" } else { "in simulation mode" };
	let message = format!("service is running {mode} | {}", health.model_info);
	HttpResponse::Ok().json(ApiResponse::ok(message, health))
}

/// Registers the endpoints and the JSON body error handler.
///
/// The caller provides the shared `web::Data<Engine>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
	let json = web::JsonConfig::default().limit(4 << 20).error_handler(|err, _req| {
		let response = HttpResponse::BadRequest().json(ApiResponse::error(format!("invalid request body: {err}")));
		InternalError::from_response(err, response).into()
	});

	cfg.app_data(json).service(train).service(generate).service(status).service(health);
}

#[cfg(test)]
mod tests {
	use actix_web::http::StatusCode;
	use actix_web::{App, test};
	use serde_json::{Value, json};

	use super::*;

	const TEXT: &str = "the quick brown fox jumps over the lazy dog and the quick red fox runs past the sleepy cat";

	macro_rules! app {
		($engine:expr) => {
			test::init_service(App::new().app_data($engine.clone()).configure(configure)).await
		};
	}

	#[actix_web::test]
	async fn train_then_generate() {
		let engine = web::Data::new(Engine::default());
		let app = app!(engine);

		let req = test::TestRequest::post()
			.uri("/api/markov/train")
			.set_json(json!({ "order": 2, "text": TEXT }))
			.to_request();
		let body: Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["order"], 2);
		assert_eq!(body["data"]["corpusLength"], 19);
		assert_eq!(body["data"]["backend"], "IN_PROCESS");

		let req = test::TestRequest::post()
			.uri("/api/markov/generate")
			.set_json(json!({ "startText": "the quick", "length": 10, "seed": 3 }))
			.to_request();
		let body: Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["usedOrder"], 2);
		assert_eq!(body["data"]["orderMismatch"], false);
		assert_eq!(body["data"]["startText"], "the quick");
		assert_eq!(body["data"]["modelUsed"], "markov-order-2");
		assert!(body["data"]["generatedLength"].as_u64().unwrap() <= 10);
		let generated = body["data"]["generatedText"].as_str().unwrap();
		assert!(!generated.is_empty());
		assert!(generated.split(' ').all(|w| TEXT.split(' ').any(|t| t == w)));
	}

	#[actix_web::test]
	async fn generate_before_training_is_a_conflict() {
		let engine = web::Data::new(Engine::default());
		let app = app!(engine);

		let req = test::TestRequest::post().uri("/api/markov/generate").set_json(json!({})).to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::CONFLICT);
		let body: Value = test::read_body_json(resp).await;
		assert_eq!(body["success"], false);
		assert!(body["data"].is_null());
	}

	#[actix_web::test]
	async fn invalid_bodies_are_rejected() {
		let engine = web::Data::new(Engine::default());
		let app = app!(engine);

		let bad = [
			("/api/markov/train", json!({ "order": 0, "text": TEXT })),
			("/api/markov/train", json!({ "order": 6, "text": TEXT })),
			("/api/markov/train", json!({ "text": "too short" })),
			("/api/markov/train", json!({ "order": 2 })),
			("/api/markov/generate", json!({ "length": 9 })),
			("/api/markov/generate", json!({ "length": 501 })),
			("/api/markov/generate", json!({ "startText": "x".repeat(501) })),
			("/api/markov/generate", json!({ "seed": -1 })),
		];
		for (uri, payload) in bad {
			let req = test::TestRequest::post().uri(uri).set_json(&payload).to_request();
			let resp = test::call_service(&app, req).await;
			assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri} {payload}");
			let body: Value = test::read_body_json(resp).await;
			assert_eq!(body["success"], false, "{uri} {payload}");
		}
		assert_eq!(engine.status().state, markov_core::SlotState::Empty);
	}

	#[actix_web::test]
	async fn requested_order_mismatch_is_reported() {
		let engine = web::Data::new(Engine::default());
		engine.train(TEXT, 1).unwrap();
		let app = app!(engine);

		let req = test::TestRequest::post()
			.uri("/api/markov/generate")
			.set_json(json!({ "order": 3, "length": 10, "seed": 1 }))
			.to_request();
		let body: Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(body["data"]["usedOrder"], 1);
		assert_eq!(body["data"]["requestedOrder"], 3);
		assert_eq!(body["data"]["orderMismatch"], true);
	}

	#[actix_web::test]
	async fn status_and_health() {
		let engine = web::Data::new(Engine::default());
		let app = app!(engine);

		let req = test::TestRequest::get().uri("/api/markov/status").to_request();
		let body: Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(body["data"]["state"], "EMPTY");
		assert!(body["data"]["order"].is_null());

		engine.train(TEXT, 2).unwrap();

		let req = test::TestRequest::get().uri("/api/markov/health").to_request();
		let body: Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["nativeIntegration"], false);
		assert_eq!(body["data"]["nativeStatus"], "SIMULATION");
		assert_eq!(body["data"]["model"]["state"], "READY");
		assert_eq!(body["data"]["model"]["order"], 2);
		assert_eq!(body["data"]["status"], "UP");
		assert_eq!(body["data"]["service"], "markov-service");
		assert!(body["data"]["timestampMs"].as_u64().unwrap() > 0);
		let message = body["message"].as_str().unwrap();
		assert!(message.ends_with(&format!("| order-2 model trained on {} characters", TEXT.len())), "{message}");
	}
}
