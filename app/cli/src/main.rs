use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    offline_cli::run().await
}
