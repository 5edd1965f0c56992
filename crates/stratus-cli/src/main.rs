//! `stratus` binary entrypoint.

#[tokio::main]
async fn main() {
    std::process::exit(stratus_cli::run().await);
}
