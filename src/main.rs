use clap::Parser;
use superscraper::{config::Args, process, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    process::run(args).await?;

    Ok(())
}
