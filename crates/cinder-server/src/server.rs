//! TCP accept loop: one task per connection.

use std::sync::Arc;

use cinder_core::Store;
use tokio::net::TcpListener;
use tracing::error;

use crate::config::Config;
use crate::connection;

/// Accepts connections forever, handing each one a cheap clone of the
/// store and config handles.
pub async fn run(
    listener: TcpListener,
    store: Arc<Store>,
    config: Arc<Config>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let store = store.clone();
        let config = config.clone();

        tokio::spawn(async move {
            if let Err(e) = connection::handle(stream, store, config).await {
                error!("connection error from {peer}: {e}");
            }
        });
    }
}
