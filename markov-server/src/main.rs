use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};

use markov_core::Engine;

mod api;
mod config;

use config::Config;

/// Main entry point for the server.
///
/// Reads the configuration, probes the native library once, and starts an
/// Actix-web HTTP server sharing a single engine across workers.
///
/// # Notes
/// - `MARKOV_CONFIG` names the TOML file, `markov.toml` otherwise.
/// - `RUST_LOG` controls verbosity, `info` by default.
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = Config::load()?;
	let engine = web::Data::new(Engine::new(&config.engine));
	let health = engine.health();
	log::info!("native integration: {}", health.native_status);
	log::info!("listening on {}:{}", config.server.host, config.server.port);

	HttpServer::new(move || {
		let cors = Cors::default()
			.allow_any_origin()
			.allowed_methods(vec!["GET", "POST"])
			.allow_any_header()
			.max_age(3600);

		App::new()
			.wrap(Logger::default())
			.wrap(cors)
			.app_data(engine.clone())
			.configure(api::configure)
	})
		.bind((config.server.host.as_str(), config.server.port))?
		.run()
		.await?;

	Ok(())
}
