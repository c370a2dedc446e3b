//! Connection session — one task per accepted tracker socket.
//!
//! Loop: check the stop token, read one frame with a deadline, decode,
//! write the acknowledgement, forward records to the sink. Decode and
//! non-timeout read errors are session-fatal; sink failures lose the
//! batch but keep the session alive. Idle connections reap themselves
//! after 60 consecutive read deadlines (~5 minutes by default).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use avl_core::FrameDecoder;

use crate::sink::RecordSink;

/// Largest read accepted from a device. Each read is decoded as one
/// frame; reassembly across TCP segments is out of scope.
pub const MAX_FRAME: usize = 2048;

/// Timing knobs. The defaults are the protocol contract; tests shrink
/// them to exercise the idle and drain paths quickly.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    /// Per-read deadline; also the stop-token recheck interval.
    pub read_timeout: Duration,
    /// Consecutive deadline expiries before the session closes itself.
    pub idle_limit: u32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        SessionTuning {
            read_timeout: Duration::from_secs(5),
            idle_limit: 60,
        }
    }
}

/// Per-connection mutable state, owned exclusively by the session task.
#[derive(Debug, Default)]
struct SessionState {
    /// Device identifier learned from the connection; empty until the
    /// first frame that names one.
    imei: String,
    /// Consecutive read-deadline counter. Reset on any data.
    timeouts: u32,
}

impl SessionState {
    /// Count one read deadline. True when the idle budget is spent.
    fn register_timeout(&mut self, limit: u32) -> bool {
        self.timeouts += 1;
        self.timeouts >= limit
    }

    fn register_data(&mut self) {
        self.timeouts = 0;
    }
}

/// Drive one connection to completion. The socket closes on return,
/// whatever the exit path.
pub async fn run(
    mut stream: TcpStream,
    peer: SocketAddr,
    decoder: Arc<dyn FrameDecoder>,
    sink: Arc<dyn RecordSink>,
    shutdown: CancellationToken,
    tuning: SessionTuning,
) {
    let protocol = decoder.protocol();
    let mut state = SessionState::default();
    let mut buf = [0u8; MAX_FRAME];

    loop {
        if shutdown.is_cancelled() {
            debug!(%peer, %protocol, "session stopping on shutdown");
            break;
        }

        let n = match timeout(tuning.read_timeout, stream.read(&mut buf)).await {
            // Deadline expiry: not an error, just a stop-token recheck
            Err(_) => {
                if state.register_timeout(tuning.idle_limit) {
                    info!(%peer, %protocol, "closing idle connection");
                    break;
                }
                continue;
            }
            Ok(Err(e)) => {
                error!(%peer, %protocol, error = %e, "connection read failed");
                break;
            }
            Ok(Ok(0)) => {
                info!(%peer, %protocol, "device disconnected");
                break;
            }
            Ok(Ok(n)) => {
                state.register_data();
                n
            }
        };

        let frame = match decoder.decode(&buf[..n], &state.imei) {
            Ok(frame) => frame,
            Err(e) => {
                error!(%peer, %protocol, error = %e, "decode failed, closing session");
                break;
            }
        };

        if let Some(imei) = frame.imei {
            if imei != state.imei {
                info!(%peer, %protocol, %imei, "device identified");
            }
            state.imei = imei;
        }

        if !frame.ack.is_empty() {
            if let Err(e) = stream.write_all(&frame.ack).await {
                error!(%peer, %protocol, error = %e, "ack write failed");
                break;
            }
        }

        if !frame.records.is_empty() {
            debug!(%peer, %protocol, count = frame.records.len(), "forwarding records");
            // Batch lost on failure; the session keeps reading
            if let Err(e) = sink.save_records(&frame.records).await {
                warn!(%peer, %protocol, error = %e, "sink save failed, batch lost");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
