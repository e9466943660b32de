use std::io::Write;

use anyhow::{Context, Result};
use model_engine::{
    logging,
    CompletionConfig, Engine, EngineConfig, GenerationRequest, ModelConfig,
};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: stream_text <model.gguf> <tokenizer.json>";
    let model = args.next().context(usage)?;
    let tokenizer = args.next().context(usage)?;

    // Configure the engine with a single completion model
    let config = EngineConfig {
        models: vec![ModelConfig::Completion(CompletionConfig {
            name: "writer".to_string(),
            path: model.into(),
            tokenizer: tokenizer.into(),
            context_length: 2048,
            device: "cpu".to_string(),
        })],
        ..EngineConfig::default()
    };

    logging::init(&config.log_filter)?;
    let mut engine = Engine::from_config(&config)?;

    let request = GenerationRequest {
        stops: vec!["\n\n".to_string()],
        max_tokens: Some(256),
        ..GenerationRequest::default()
    };

    // Read prompts until EOF or "exit", streaming chunks as they decode
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

        let mut finish = None;
        for chunk in engine.stream("writer", input, &request)? {
            let chunk = chunk?;
            print!("{}", chunk.text);
            std::io::stdout().flush()?;
            finish = chunk.finish;
        }
        println!();
        if let Some(reason) = finish {
            println!("[finished: {}]", reason);
        }
    }

    Ok(())
}
