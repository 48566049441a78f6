//! Line-delimited JSON over TCP.
//!
//! Every connection is served by its own task. One request per line, one
//! response line back, in order. All connections share the same engine, so
//! concurrent dispenses are serialised by its record lock.

use super::protocol;
use crate::application::engine::PharmacyEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Accepts connections until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    engine: Arc<PharmacyEngine>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let engine = engine.clone();
                tokio::spawn(async move {
                    debug!(%peer, "connection opened");
                    if let Err(e) = handle_connection(stream, &engine).await {
                        warn!(%peer, error = %e, "connection closed with error");
                    } else {
                        debug!(%peer, "connection closed");
                    }
                });
            }
            () = &mut shutdown => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, engine: &PharmacyEngine) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = protocol::handle_line(engine, &line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
    }
    Ok(())
}
