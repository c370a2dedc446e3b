//! Listener manager — one per enabled protocol/port.
//!
//! Owns the bound socket, accepts with a bounded wait so the stop token
//! is observed between accepts, and spawns one session task per
//! connection. `stop()` cancels the token and then waits for the accept
//! loop and every spawned session to drain; nothing is ever aborted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use avl_core::{decoder_for, FrameDecoder, Protocol};

use crate::session::{self, SessionTuning};
use crate::sink::RecordSink;

#[derive(Debug, Clone)]
pub struct ServerTuning {
    /// Bounded accept wait; also the stop-token recheck interval.
    pub accept_timeout: Duration,
    pub session: SessionTuning,
}

impl Default for ServerTuning {
    fn default() -> Self {
        ServerTuning {
            accept_timeout: Duration::from_secs(5),
            session: SessionTuning::default(),
        }
    }
}

/// TCP ingest server for one tracker protocol.
pub struct GpsServer {
    protocol: Protocol,
    decoder: Arc<dyn FrameDecoder>,
    sink: Arc<dyn RecordSink>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    tuning: ServerTuning,
    local_addr: Option<SocketAddr>,
}

impl GpsServer {
    pub fn new(protocol: Protocol, sink: Arc<dyn RecordSink>) -> Self {
        Self::with_tuning(protocol, sink, ServerTuning::default())
    }

    pub fn with_tuning(
        protocol: Protocol,
        sink: Arc<dyn RecordSink>,
        tuning: ServerTuning,
    ) -> Self {
        GpsServer {
            protocol,
            decoder: Arc::from(decoder_for(protocol)),
            sink,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            tuning,
            local_addr: None,
        }
    }

    /// Bind the listening socket and spawn the accept loop. A bind
    /// failure is fatal: the caller aborts process startup.
    pub async fn start(&mut self, host: &str, port: u16) -> io::Result<()> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);
        info!(protocol = %self.protocol, %addr, "listening");

        self.tracker.spawn(accept_loop(
            listener,
            self.protocol,
            self.decoder.clone(),
            self.sink.clone(),
            self.shutdown.clone(),
            self.tracker.clone(),
            self.tuning.clone(),
        ));
        Ok(())
    }

    /// Address actually bound, once started. Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Signal the accept loop and every session to stop, then wait for
    /// all of them to exit. Unbounded wait, no forced termination.
    pub async fn stop(&self) {
        info!(protocol = %self.protocol, "stopping server");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(protocol = %self.protocol, "server drained");
    }
}

async fn accept_loop(
    listener: TcpListener,
    protocol: Protocol,
    decoder: Arc<dyn FrameDecoder>,
    sink: Arc<dyn RecordSink>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    tuning: ServerTuning,
) {
    loop {
        if shutdown.is_cancelled() {
            // Returning drops the listener, so no connection is
            // accepted after stop() observes the drained tracker.
            info!(%protocol, "closing listener");
            return;
        }

        match timeout(tuning.accept_timeout, listener.accept()).await {
            // Bounded wait expired: recheck the stop token
            Err(_) => continue,
            Ok(Err(e)) => {
                // A single bad accept never kills the listener
                warn!(%protocol, error = %e, "accept failed");
                continue;
            }
            Ok(Ok((socket, peer))) => {
                info!(%protocol, %peer, "device connected");
                tracker.spawn(session::run(
                    socket,
                    peer,
                    decoder.clone(),
                    sink.clone(),
                    shutdown.clone(),
                    tuning.session.clone(),
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
