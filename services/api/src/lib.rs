mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use loop_autopilot::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
