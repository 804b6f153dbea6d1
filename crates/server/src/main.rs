use anyhow::{bail, Result};
use banklens_core::config::LoadOptions;
use banklens_server::{parse_service, run};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let name = std::env::args().nth(1).unwrap_or_else(|| "slack".to_string());
    let Some(service) = parse_service(&name) else {
        bail!("unknown service `{name}` (expected slack|dashboard|eda|notifier)");
    };

    run(service, LoadOptions::default()).await
}
