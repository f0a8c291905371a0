//! Weft CLI Binary
//!
//! Command-line interface for routing natural-language requests to workspace resources.

use anyhow::Context;
use clap::Parser;
use std::process;
use weft::tooling::cli::{init, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let context = match init(&cli).context("Error initializing workspace") {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            println!("{}", output.text);
            if !output.success {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
