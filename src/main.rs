use std::env;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use imgpress_rs::{Client, ClientConfig, Options, compression_types};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!("  account");
    eprintln!("  limit");
    eprintln!("  supported [extensions|mime]");
    eprintln!("  compress <images> [lossy|lossless] [callback_url]");
    eprintln!("    images: comma-separated (e.g., https://a/1.png,https://a/2.jpg)");
    eprintln!();
    eprintln!("Credentials are read from IMGPRESS_API_KEY and IMGPRESS_API_SECRET.");
    std::process::exit(1);
}

/// argv[0], or the binary name when the OS passed an empty argv
fn program_name(args: &[String]) -> &str {
    args.first().map_or("imgpress", String::as_str)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "imgpress_rs=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let program = program_name(&args);
    let Some(command) = args.get(1) else {
        usage(program);
    };

    let config = ClientConfig::from_env().context("Failed to read configuration")?;
    let client = Client::with_config(config)
        .await
        .context("Failed to initialize ImgPress client")?;

    let result = match command.as_str() {
        "account" => client.account().await,
        "limit" => client.limit().await.map(Value::Number),
        "supported" => client.supported(args.get(2).map(|s| s.as_str())).await,
        "compress" => {
            let Some(images) = args.get(2) else {
                usage(program);
            };

            // Parse comma-separated image references
            let images: Vec<String> = images
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if images.is_empty() {
                eprintln!("Error: No images provided");
                std::process::exit(1);
            }

            let compression_type = args
                .get(3)
                .map(|s| s.as_str())
                .unwrap_or(compression_types::LOSSY);

            let mut options = Options::new();
            if let Some(callback) = args.get(4) {
                options = options.callback(callback.as_str()).wait(false);
            }

            if images.len() == 1 {
                client
                    .compress(images[0].as_str(), compression_type, options)
                    .await?
            } else {
                client
                    .compress_multiple(images, compression_type, options)
                    .await?
            }
        }
        _ => usage(program),
    };

    match result {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        None => {
            let error = client
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!("Request failed: {}", error);
            std::process::exit(1);
        }
    }
}
