use color_eyre::Result;
use tracing::info;

use crate::{http_server, AppConfig, AppState};

pub(crate) async fn serve() -> Result<()> {
    let config = AppConfig::from_env()?;
    let app_state = AppState::from_config(&config).await?;

    info!("Serving recipes");
    http_server::run_server(http_server::app(app_state), config.port).await?;

    info!("Main Returning");

    Ok(())
}
