pub mod core;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::commands::{execute, Cli};
use crate::core::errors::error_kind;

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli).await {
        Ok(value) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let error_json = serde_json::json!({
                "error": error_kind(&err),
                "message": format!("{err:#}"),
            });
            println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so stdout stays valid JSON.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn,cv_match=info",
        1 => "info,cv_match=debug",
        _ => "debug,cv_match=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
