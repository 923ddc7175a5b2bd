//! Per-connection I/O task.
//!
//! Each accepted socket gets one task that exclusively owns a
//! [`ConnectionDriver`]. The task reads into a fixed buffer, feeds the driver,
//! and forwards decoded readings to the pipeline. A read may carry the tail of
//! one frame and the start of the next; it is fed in pieces no larger than
//! the driver's outstanding byte count so frame boundaries inside a read are
//! honoured.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::counters::PacketCounters;
use crate::driver::{BadFrame, ConnectionDriver, FrameObserver};
use crate::{PacketCounts, Reading};

/// Default receive buffer size per connection.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Identity and shared state handed to a connection task.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Server-assigned connection id
    pub id: u64,
    pub peer: SocketAddr,
    pub read_buffer_size: usize,
    /// Process-wide totals
    pub counters: Arc<PacketCounters>,
}

/// Logs driver outcomes and feeds the process-wide counters.
struct ConnectionObserver {
    id: u64,
    peer: SocketAddr,
    counters: Arc<PacketCounters>,
}

impl FrameObserver for ConnectionObserver {
    fn on_bad_frame(&mut self, bad: &BadFrame, counts: PacketCounts) {
        let totals = self.counters.record(0, 1);
        warn!(
            connection = self.id,
            peer = %self.peer,
            kind = ?bad.error.kind(),
            received = bad.received,
            outstanding = bad.outstanding,
            data = %bad.preview_hex(),
            good = counts.good,
            bad = counts.bad,
            total_good = totals.good,
            total_bad = totals.bad,
            "Bad packet: {}",
            bad.error
        );
    }

    fn on_reading(&mut self, reading: &Reading, counts: PacketCounts) {
        let totals = self.counters.record(1, 0);
        trace!(
            connection = self.id,
            device = %reading.device_id,
            good = counts.good,
            total_good = totals.good,
            "Good packet"
        );
    }
}

/// Drive one connection until EOF, a read error, cancellation, or the
/// pipeline going away. Returns the connection's final counts.
pub async fn run_connection<R>(
    mut reader: R,
    context: ConnectionContext,
    readings: mpsc::Sender<Reading>,
    cancel: CancellationToken,
) -> PacketCounts
where
    R: AsyncRead + Unpin,
{
    let ConnectionContext { id, peer, read_buffer_size, counters } = context;
    let mut driver = ConnectionDriver::new(ConnectionObserver { id, peer, counters });
    let mut buffer = vec![0u8; read_buffer_size.max(1)];

    info!(connection = id, %peer, "Connection opened");

    'read: loop {
        // Wait for bytes or shutdown, whichever comes first
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!(connection = id, %peer, "Connection cancelled");
                break;
            }
            result = reader.read(&mut buffer) => result,
        };

        // Zero bytes means the peer closed its side
        let received = match result {
            Ok(0) => {
                info!(connection = id, %peer, "Peer closed connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                error!(connection = id, %peer, "Read failed: {}", e);
                break;
            }
        };
        trace!(connection = id, bytes = received, "Received");

        // A read may span frames. Feed at most what the current frame still needs.
        let mut rest = &buffer[..received];
        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(rest.len().min(driver.outstanding()));
            rest = tail;

            // Forward completed readings; a closed pipeline ends the connection
            if let Some(reading) = driver.on_bytes_received(chunk) {
                if readings.send(reading).await.is_err() {
                    warn!(connection = id, "Reading pipeline closed");
                    break 'read;
                }
            }
        }
    }

    // A partial frame left in the buffer is reported here
    driver.on_connection_closed();
    let counts = driver.counts();
    info!(connection = id, %peer, good = counts.good, bad = counts.bad, "Connection closed");
    counts
}

#[cfg(test)]
mod tests;
