use tracing::info;

use crate::api;
use crate::cli::commands::ServeArgs;
use crate::errors::VigilError;

pub async fn handle_serve(args: ServeArgs) -> Result<(), VigilError> {
    let config = super::load_config(args.config.as_deref()).await?;
    info!(host = %args.host, port = args.port, "Starting API server");

    let state = api::create_app_state(config)?;
    let app = api::build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| VigilError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
