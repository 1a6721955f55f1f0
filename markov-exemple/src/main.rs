use std::env;

use markov_core::io::read_corpus;
use markov_core::{Engine, EngineConfig, GenerationRequest};

const FALLBACK_CORPUS: &str = "The old lighthouse keeper climbed the stairs every night. \
    The stairs were steep and the night was long. Every night the keeper lit the lamp \
    and the lamp threw its light across the water. The water was dark and the ships \
    followed the light home. When the keeper grew old the stairs grew longer, \
    but the lamp was lit every night and the ships came home.";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // First argument is an optional corpus file
    let corpus = match env::args().nth(1) {
        Some(path) => read_corpus(&path)?,
        None => {
            log::info!("no corpus given, using the built-in paragraph");
            FALLBACK_CORPUS.to_owned()
        }
    };

    // Probes for the native library; without it everything runs in-process
    let engine = Engine::new(&EngineConfig::default());

    // Order 2: each word is drawn from the two words before it
    let stats = engine.train(&corpus, 2)?;
    println!(
        "Trained order {} on {} words: {} distinct words, {} states, {} contexts ({} ms, {})",
        stats.order,
        stats.corpus_length,
        stats.vocabulary_size,
        stats.state_count,
        stats.context_count,
        stats.duration_ms,
        stats.backend
    );

    // A fixed seed gives the same text on every run
    let seeded = GenerationRequest::new(30).with_start("the keeper").with_seed(42);
    for _ in 0..2 {
        println!("Seeded: {}", engine.generate(&seeded)?.generated_text);
    }

    // Without a seed every line differs
    for i in 0..3 {
        let generated = engine.generate(&GenerationRequest::new(30))?;
        println!("Line {}: {}", i + 1, generated.generated_text);
        if generated.truncated_early {
            println!("  (stopped after {} words, dead end)", generated.generated_length);
        }
    }

    // Asking for another order is allowed; the trained one is used
    let generated = engine.generate(&GenerationRequest::new(20).with_order(3))?;
    println!("Order {} requested, order {} used: {}", 3, generated.used_order, generated.generated_text);

    Ok(())
}
