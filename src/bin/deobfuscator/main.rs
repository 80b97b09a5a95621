use std::{env, fs};
use antibot_deobfuscator::{Config, deobfuscate};
use tracing_subscriber::EnvFilter;

// Deobfuscates the given script and prints the result.
// Set RUST_LOG=debug to see which passes applied.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let path = match args.get(1) {
        Some(v) => v,
        None => {
            println!("Usage: deobfuscator <script.js> [config.json]");
            println!("The configuration is optional. Read DESIGN.md for its keys.");
            return;
        }
    };

    let code = fs::read_to_string(path)
        .expect("failed to read script");
    let config = match args.get(2) {
        Some(config_path) => {
            let raw = fs::read_to_string(config_path)
                .expect("failed to read config");
            Config::from_json(&raw)
                .expect("failed to parse config")
        }
        None => Config::default()
    };

    let output = deobfuscate(&code, &config)
        .expect("failed to deobfuscate");
    println!("{}", output);
}
