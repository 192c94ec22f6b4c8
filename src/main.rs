use clap::Parser;
use dotenv::dotenv;
use parlor_client::cli;
use parlor_client::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    cli::run(config).await
}
