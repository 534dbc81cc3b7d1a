use anyhow::{Context, Result};
use conduit_runtime::config::RuntimeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment variables
    let config = RuntimeConfig::load().context("Failed to load configuration")?;

    // Run the runtime using the library's run function
    conduit_runtime::run(config).await.context("Runtime error")?;

    Ok(())
}
