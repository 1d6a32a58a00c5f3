use mock_server::{Mock, MockServer};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = MockServer::new();
    if let Ok(path) = std::env::var("MOCKS_FILE") {
        let raw = std::fs::read_to_string(&path)?;
        let mocks: Vec<Mock> = serde_json::from_str(&raw)?;
        info!(%path, count = mocks.len(), "loaded mocks");
        for mock in mocks {
            server.register(mock).await;
        }
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    mock_server::run(listener, server).await?;
    Ok(())
}
