use std::process::ExitCode;

use tokendrop_api::{build_state, init_tracing, serve};
use tokendrop_types::{ServiceConfig, constants};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    tracing::info!(version = constants::VERSION, listen = %config.listen_addr, "Starting {}", constants::SERVICE_NAME);

    let state = match build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = serve(config.listen_addr, state).await {
        tracing::error!(error = %e, "Server stopped with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
