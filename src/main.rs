use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cv_match::run().await
}
