use std::io::Write;

use anyhow::{Context, Result};
use model_engine::{
    logging,
    EmbeddingConfig, Engine, EngineConfig, ModelConfig, ModelInput, ModelOutput,
};

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .context("usage: embed_text <model-dir>")?;

    // Configure the engine with a single embedding model
    let config = EngineConfig {
        models: vec![ModelConfig::Embedding(EmbeddingConfig {
            name: "encoder".to_string(),
            path: dir.into(),
            device: "cpu".to_string(),
        })],
        ..EngineConfig::default()
    };

    logging::init(&config.log_filter)?;
    let mut engine = Engine::from_config(&config)?;

    // Embed one line of text at a time
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        let bytes = std::io::stdin().read_line(&mut input)?;
        let input = input.trim();
        if bytes == 0 || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let output = engine.invoke("encoder", ModelInput::Embed(input.to_string()))?;
        if let ModelOutput::Embedding(vector) = output {
            let preview: Vec<String> =
                vector.iter().take(8).map(|v| format!("{:.4}", v)).collect();
            println!("[{} dims] {} ...", vector.len(), preview.join(" "));
        }
    }

    Ok(())
}
