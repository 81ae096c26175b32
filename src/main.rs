use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    modscout::cli::run().await
}
