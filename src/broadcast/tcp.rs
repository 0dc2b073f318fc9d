// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Broadcaster, Subscription};
use crate::errors::EngineError;
use crate::observability::messages::broadcast::PublisherListening;
use crate::observability::messages::StructuredLog;

/// Exposes a [`Broadcaster`] over TCP as newline-delimited JSON.
///
/// Every accepted connection becomes a subscriber with its own bounded queue, so a slow
/// client loses messages instead of slowing down the coordinator.
pub struct TcpPublisher {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TcpPublisher {
    pub async fn bind(address: &str, port: u16, broadcaster: Broadcaster) -> Result<Self, EngineError> {
        let listener = TcpListener::bind((address, port))
            .await
            .map_err(EngineError::Broadcast)?;
        let local_addr = listener.local_addr().map_err(EngineError::Broadcast)?;
        PublisherListening {
            topic: broadcaster.topic(),
            address: local_addr,
        }
        .log();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, broadcaster, cancel.clone()));
        Ok(Self {
            local_addr,
            cancel,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and closes every connection.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        // A panicked accept loop has nothing left to clean up.
        let _ = self.task.await;
    }
}

async fn accept_loop(listener: TcpListener, broadcaster: Broadcaster, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let subscription = broadcaster.subscribe_from(Some(peer));
                    tokio::spawn(serve(stream, subscription, cancel.clone()));
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept broadcast subscriber"),
            },
        }
    }
}

async fn serve(mut stream: TcpStream, mut subscription: Subscription, cancel: CancellationToken) {
    loop {
        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            payload = subscription.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };
        if stream.write_all(payload.as_bytes()).await.is_err() || stream.write_all(b"\n").await.is_err() {
            break;
        }
    }
    let _ = stream.shutdown().await;
}
