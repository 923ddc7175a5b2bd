//! TCP listener for GEM devices.
//!
//! The server accepts device connections, runs one
//! [`run_connection`] task per socket, and funnels every decoded reading
//! through a single pipeline task:
//!
//! ```text
//! socket ─▶ connection task ─┐
//! socket ─▶ connection task ─┼─ mpsc ─▶ pipeline ─▶ store, sinks, subscribers
//! socket ─▶ connection task ─┘
//! ```

use chrono::Utc;
use dashmap::DashMap;
use futures::Stream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionContext, DEFAULT_READ_BUFFER_SIZE, run_connection};
use crate::counters::PacketCounters;
use crate::sink::ReadingSink;
use crate::store::ReadingStore;
use crate::{GemError, Reading, Result};

/// Pending-connection queue length requested from the OS.
pub const LISTEN_BACKLOG: u32 = 16;

/// Tunables for [`GemServer::bind`].
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub read_buffer_size: usize,
    /// Readings queued between connection tasks and the pipeline
    pub pipeline_capacity: usize,
    /// Readings buffered per subscriber before it starts skipping
    pub broadcast_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            pipeline_capacity: 256,
            broadcast_capacity: 256,
        }
    }
}

/// Running listener plus its pipeline.
///
/// Dropping the server cancels every task; [`shutdown`](Self::shutdown) also
/// waits for connections to finalise and the pipeline to drain.
pub struct GemServer {
    local_addr: SocketAddr,
    store: Arc<ReadingStore>,
    counters: Arc<PacketCounters>,
    connections: Arc<DashMap<u64, SocketAddr>>,
    broadcast: broadcast::Sender<Arc<Reading>>,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    pipeline_task: Option<JoinHandle<()>>,
}

impl GemServer {
    /// Bind `addr` and start accepting. Port 0 picks an ephemeral port.
    pub async fn bind(
        addr: SocketAddr,
        settings: ServerSettings,
        sinks: Vec<Box<dyn ReadingSink>>,
    ) -> Result<Self> {
        let listener = listen(addr)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GemError::io_error(format!("listener {}", addr), e))?;
        info!(%local_addr, "Listening for GEM devices");

        let store = Arc::new(ReadingStore::new());
        let counters = Arc::new(PacketCounters::new());
        let connections = Arc::new(DashMap::new());
        let (broadcast, _) = broadcast::channel(settings.broadcast_capacity.max(1));
        let (readings_tx, readings_rx) = mpsc::channel(settings.pipeline_capacity.max(1));
        let cancel = CancellationToken::new();

        let pipeline_task = tokio::spawn(pipeline(
            readings_rx,
            Arc::clone(&store),
            sinks,
            broadcast.clone(),
        ));

        let accept_task = tokio::spawn(accept_loop(AcceptState {
            listener,
            settings,
            counters: Arc::clone(&counters),
            connections: Arc::clone(&connections),
            readings: readings_tx,
            cancel: cancel.clone(),
        }));

        Ok(Self {
            local_addr,
            store,
            counters,
            connections,
            broadcast,
            cancel,
            accept_task: Some(accept_task),
            pipeline_task: Some(pipeline_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of device connections currently open.
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Open connections as `(id, peer)` pairs, ordered by id.
    pub fn connections(&self) -> Vec<(u64, SocketAddr)> {
        let mut connections: Vec<_> =
            self.connections.iter().map(|entry| (*entry.key(), *entry.value())).collect();
        connections.sort();
        connections
    }

    pub fn store(&self) -> Arc<ReadingStore> {
        Arc::clone(&self.store)
    }

    pub fn counters(&self) -> Arc<PacketCounters> {
        Arc::clone(&self.counters)
    }

    /// Stream of readings decoded after this call.
    ///
    /// A subscriber that falls behind by more than the broadcast capacity
    /// skips the readings it missed.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<Reading>> + Send + use<> {
        BroadcastStream::new(self.broadcast.subscribe()).filter_map(|item| match item {
            Ok(reading) => Some(reading),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Subscriber lagging, readings skipped");
                None
            }
        })
    }

    /// Stop accepting, close every connection, and drain the pipeline.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down listener");
        self.cancel.cancel();

        if let Some(task) = self.accept_task.take() {
            task.await.map_err(|e| join_error("accept loop", e))?;
        }
        if let Some(task) = self.pipeline_task.take() {
            task.await.map_err(|e| join_error("pipeline", e))?;
        }

        let totals = self.counters.totals();
        info!(good = totals.good, bad = totals.bad, devices = self.store.len(), "Listener stopped");
        Ok(())
    }
}

impl Drop for GemServer {
    fn drop(&mut self) {
        debug!("Dropping GEM server");
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for GemServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemServer")
            .field("local_addr", &self.local_addr)
            .field("active_connections", &self.connections.len())
            .field("devices", &self.store.len())
            .finish()
    }
}

fn join_error(task: &str, e: tokio::task::JoinError) -> GemError {
    GemError::io_error(format!("{} task", task), std::io::Error::other(e))
}

fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let context = || format!("bind {}", addr);
    let socket = if addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() };
    let socket = socket.map_err(|e| GemError::io_error(context(), e))?;
    socket.set_reuseaddr(true).map_err(|e| GemError::io_error(context(), e))?;
    socket.bind(addr).map_err(|e| GemError::io_error(context(), e))?;
    socket.listen(LISTEN_BACKLOG).map_err(|e| GemError::io_error(context(), e))
}

struct AcceptState {
    listener: TcpListener,
    settings: ServerSettings,
    counters: Arc<PacketCounters>,
    connections: Arc<DashMap<u64, SocketAddr>>,
    readings: mpsc::Sender<Reading>,
    cancel: CancellationToken,
}

async fn accept_loop(state: AcceptState) {
    let AcceptState { listener, settings, counters, connections, readings, cancel } = state;
    let mut tasks = JoinSet::new();
    let mut next_id: u64 = 0;

    loop {
        let accepted = tokio::select! {
            // Shutdown requested
            _ = cancel.cancelled() => break,
            // Reap finished connection tasks
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                reap(joined);
                continue;
            }
            accepted = listener.accept() => accepted,
        };

        let (socket, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                // Avoid spinning on persistent accept errors
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        next_id += 1;
        let id = next_id;
        let registration = Registration::new(Arc::clone(&connections), id, peer);
        debug!(connection = id, %peer, active = connections.len(), "Accepted");

        let context = ConnectionContext {
            id,
            peer,
            read_buffer_size: settings.read_buffer_size,
            counters: Arc::clone(&counters),
        };
        let readings = readings.clone();
        let cancel = cancel.child_token();

        // The registration drops with the task, panicked or not
        tasks.spawn(async move {
            let _registration = registration;
            run_connection(socket, context, readings, cancel).await;
        });
    }

    // Connection tasks hold child tokens and finalise their partial frames
    info!(open = tasks.len(), "Accept loop stopped, closing connections");
    while let Some(joined) = tasks.join_next().await {
        reap(joined);
    }
}

/// Log a connection task that ended abnormally. Returns whether it failed.
fn reap(joined: std::result::Result<(), tokio::task::JoinError>) -> bool {
    match joined {
        Ok(()) => false,
        Err(e) if e.is_panic() => {
            error!("Connection task panicked: {}", e);
            true
        }
        Err(e) => {
            debug!("Connection task cancelled: {}", e);
            true
        }
    }
}

/// Registry entry for one open connection, removed on drop.
struct Registration {
    connections: Arc<DashMap<u64, SocketAddr>>,
    id: u64,
}

impl Registration {
    fn new(connections: Arc<DashMap<u64, SocketAddr>>, id: u64, peer: SocketAddr) -> Self {
        connections.insert(id, peer);
        Self { connections, id }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.connections.remove(&self.id);
    }
}

async fn pipeline(
    mut readings: mpsc::Receiver<Reading>,
    store: Arc<ReadingStore>,
    mut sinks: Vec<Box<dyn ReadingSink>>,
    broadcast: broadcast::Sender<Arc<Reading>>,
) {
    info!(sinks = sinks.len(), "Reading pipeline started");

    while let Some(reading) = readings.recv().await {
        let received_at = Utc::now();
        let reading = Arc::new(reading);

        // Store before fan-out
        if let Some(previous) = store.insert(Arc::clone(&reading)) {
            debug!(
                device = %reading.device_id,
                previous_seconds = previous.elapsed_seconds,
                seconds = reading.elapsed_seconds,
                "Replaced reading"
            );
        } else {
            info!(device = %reading.device_id, devices = store.len(), "New device");
        }

        // A failing sink does not stop the others
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.write(&reading, received_at).await {
                warn!(sink = sink.name(), "Sink write failed: {}", e);
            }
        }

        // No subscribers is not an error
        let _ = broadcast.send(reading);
    }

    info!("Reading pipeline stopped");
}
