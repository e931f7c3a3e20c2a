// ── WebSocket server ──
//
// One task per remote connection. Each connection receives the
// authentication greeting, its own responses, and every broadcast event.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::error::HostError;
use crate::protocol::Outbound;

pub async fn bind(addr: &str) -> Result<TcpListener, HostError> {
    TcpListener::bind(addr).await.map_err(|source| HostError::Bind {
        addr: addr.to_owned(),
        source,
    })
}

/// Accept connections until cancelled.
pub async fn serve(
    listener: TcpListener,
    adapter: Adapter,
    cancel: CancellationToken,
) -> Result<(), HostError> {
    info!(addr = %listener.local_addr()?, "integration server listening");
    let forwarder = adapter.spawn_forwarder(cancel.child_token());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let adapter = adapter.clone();
                let cancel = cancel.child_token();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, adapter, cancel).await {
                        debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
        }
    }

    let _ = forwarder.await;
    info!("integration server stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    adapter: Adapter,
    cancel: CancellationToken,
) -> Result<(), HostError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    info!(%peer, "remote connected");
    let (mut write, mut read) = ws.split();
    let mut events = adapter.events();

    write
        .send(Message::text(Outbound::authentication().to_json()))
        .await?;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for out in adapter.handle_text(text.as_str()).await {
                        write.send(Message::text(out.to_json())).await?;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            event = events.recv() => match event {
                Ok(event) => write.send(Message::text(event.to_json())).await?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(%peer, skipped = n, "connection lagged behind events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!(%peer, "remote disconnected");
    Ok(())
}
