//! IO task for the S4 monitor.
//!
//! One tokio task owns the transport exclusively. It is the only writer to
//! the wire and the only writer to [`LiveState`], and it keeps the set of
//! outstanding polls. Callers talk to it through [`MonitorIo`].
//!
//! Inbound bytes are split into lines, classified once, and each frame is
//! published on its category channel in [`FrameChannels`]. Data values are
//! decoded against the registry, applied to live state, and then used to
//! fulfil any poll waiting on that field.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use rowlib_core::error::{Error, Result};
use rowlib_core::events::{Marker, MonitorEvent, StrokeEvent};
use rowlib_core::transport::Transport;
use rowlib_core::types::Reading;

use crate::decoder;
use crate::protocol::{self, DecodeResult, Frame};
use crate::registry::Registry;
use crate::state::LiveState;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Default period of the expired-poll sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Default capacity of each broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Timing knobs for the IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// How often expired polls are failed with [`Error::PollTimeout`].
    pub sweep_interval: Duration,
    /// How long a single idle read may block the loop.
    pub read_timeout: Duration,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            read_timeout: Duration::from_millis(50),
        }
    }
}

/// One broadcast sender per frame category.
#[derive(Debug, Clone)]
pub struct FrameChannels {
    /// `PING` heartbeats.
    pub pings: broadcast::Sender<Marker>,
    /// `P<hh>` pulse counts.
    pub pulses: broadcast::Sender<u8>,
    /// `ERROR` frames.
    pub errors: broadcast::Sender<Marker>,
    /// `SS` / `SE` stroke boundaries.
    pub strokes: broadcast::Sender<StrokeEvent>,
    /// Successfully decoded data values.
    pub readings: broadcast::Sender<Reading>,
    /// Connection lifecycle.
    pub lifecycle: broadcast::Sender<MonitorEvent>,
}

impl FrameChannels {
    /// Create all channels with the same capacity.
    pub fn new(capacity: usize) -> Self {
        FrameChannels {
            pings: broadcast::channel(capacity).0,
            pulses: broadcast::channel(capacity).0,
            errors: broadcast::channel(capacity).0,
            strokes: broadcast::channel(capacity).0,
            readings: broadcast::channel(capacity).0,
            lifecycle: broadcast::channel(capacity).0,
        }
    }
}

impl Default for FrameChannels {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// State shared between the IO task and its callers.
#[derive(Debug, Clone)]
pub struct MonitorShared {
    /// Immutable memory map.
    pub registry: Arc<Registry>,
    /// Last known values. Written only by the IO task.
    pub live: Arc<RwLock<LiveState>>,
    /// Event channels.
    pub channels: FrameChannels,
    /// Set once initialization completes, cleared on close or loss.
    pub open: Arc<AtomicBool>,
}

impl MonitorShared {
    /// Fresh shared state for `registry`, with every field unknown.
    pub fn new(registry: Arc<Registry>, channels: FrameChannels) -> Self {
        let live = LiveState::new(&registry);
        MonitorShared {
            registry,
            live: Arc::new(RwLock::new(live)),
            channels,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy of the current live state.
    pub fn snapshot(&self) -> LiveState {
        self.live
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// A request sent to the IO task.
pub enum Request {
    /// Write one command payload. The terminator is added by the IO task.
    Send {
        payload: String,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Write a memory read request and wait for the matching value.
    Poll {
        name: String,
        payload: String,
        timeout: Duration,
        reply: oneshot::Sender<Result<u32>>,
    },
    /// Fail all pending polls, close the transport and stop.
    Shutdown { reply: oneshot::Sender<Result<()>> },
}

/// Handle to the IO task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MonitorIo {
    tx: mpsc::Sender<Request>,
    cancel: CancellationToken,
}

impl MonitorIo {
    /// Write one command payload.
    pub async fn send(&self, payload: String) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Send {
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.unwrap_or(Err(Error::NotConnected))
    }

    /// Submit a poll. The returned handle resolves once the value arrives,
    /// the deadline passes, or the monitor goes away.
    ///
    /// `payload` must be the encoded read request for `name`.
    pub async fn poll(&self, name: &str, payload: String, timeout: Duration) -> Result<PollHandle> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Poll {
                name: name.to_string(),
                payload,
                timeout,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        Ok(PollHandle {
            name: name.to_string(),
            rx: reply_rx,
        })
    }

    /// Ask the IO task to stop and wait for it to release the transport.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .is_err()
        {
            // Task already gone: nothing left to close.
            return Ok(());
        }
        reply_rx.await.unwrap_or(Ok(()))
    }

    /// Stop the IO task without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the IO task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Pending result of a poll.
///
/// Resolves to exactly one of: the decoded value, [`Error::PollTimeout`],
/// [`Error::Disconnected`], or the error from writing the request.
#[derive(Debug)]
pub struct PollHandle {
    name: String,
    rx: oneshot::Receiver<Result<u32>>,
}

impl PollHandle {
    /// Field this poll is waiting on.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Future for PollHandle {
    type Output = Result<u32>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The IO task dropped the reply without answering.
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending polls
// ---------------------------------------------------------------------------

struct PendingQuery {
    id: u64,
    name: String,
    deadline: Instant,
    reply: oneshot::Sender<Result<u32>>,
}

/// Upper bound for a poll deadline. Longer timeouts, up to
/// `Duration::MAX`, are clamped to this.
const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(MAX_POLL_TIMEOUT)).unwrap_or(now)
}

/// Outstanding polls, owned by the IO task.
#[derive(Default)]
struct Correlator {
    pending: Vec<PendingQuery>,
    next_id: u64,
}

impl Correlator {
    fn register(
        &mut self,
        name: String,
        deadline: Instant,
        reply: oneshot::Sender<Result<u32>>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(PendingQuery {
            id,
            name,
            deadline,
            reply,
        });
        id
    }

    /// Resolve every live query for `name`. Queries past their deadline are
    /// left for the sweep. Returns the number fulfilled.
    fn fulfil(&mut self, name: &str, value: u32, now: Instant) -> usize {
        let mut fulfilled = 0;
        let mut i = 0;
        while i < self.pending.len() {
            let query = &self.pending[i];
            if query.name == name && now <= query.deadline {
                let query = self.pending.swap_remove(i);
                debug!(id = query.id, name, value, "poll fulfilled");
                let _ = query.reply.send(Ok(value));
                fulfilled += 1;
            } else {
                i += 1;
            }
        }
        fulfilled
    }

    /// Fail every query whose deadline has passed.
    fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline < now {
                let query = self.pending.swap_remove(i);
                debug!(id = query.id, name = %query.name, "poll timed out");
                let _ = query.reply.send(Err(Error::PollTimeout(query.name)));
                expired += 1;
            } else {
                i += 1;
            }
        }
        expired
    }

    /// Fail every outstanding query with [`Error::Disconnected`].
    fn fail_all(&mut self) -> usize {
        let count = self.pending.len();
        for query in self.pending.drain(..) {
            debug!(id = query.id, name = %query.name, "poll failed: disconnected");
            let _ = query.reply.send(Err(Error::Disconnected));
        }
        count
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the caller handle and the task's join handle.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    shared: MonitorShared,
) -> (MonitorIo, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(io_loop(transport, config, shared, rx, cancel.clone()));

    (MonitorIo { tx, cancel }, task)
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// Maximum line buffer size before reset. S4 lines are under 16 bytes.
const MAX_BUF: usize = 4096;

/// Why the loop stopped.
enum Exit {
    /// Shutdown request or cancellation.
    Closed,
    /// The transport failed underneath us.
    Lost,
}

/// The main IO loop.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Caller requests
/// 3. Expired-poll sweep (only while polls are pending)
/// 4. Idle read of inbound frames
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    shared: MonitorShared,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut line_buf: Vec<u8> = Vec::new();
    let mut correlator = Correlator::default();
    let mut sweep = tokio::time::interval(config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("S4 IO task cancelled");
                break Exit::Closed;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("S4 IO task shutdown requested");
                        finish(&mut correlator, &shared);
                        let _ = reply.send(transport.close().await);
                        return;
                    }
                    Some(req) => {
                        if handle_request(req, &mut *transport, &mut correlator).await {
                            debug!("transport write failed, stopping");
                            break Exit::Lost;
                        }
                    }
                    None => {
                        debug!("request channel closed, exiting S4 IO task");
                        break Exit::Closed;
                    }
                }
            }

            _ = sweep.tick(), if !correlator.is_empty() => {
                correlator.expire(Instant::now());
            }

            lost = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, config.read_timeout).await {
                    Ok(n) if n > 0 => {
                        ingest(&mut line_buf, &buf[..n], &shared, &mut correlator);
                        false
                    }
                    Err(e) if e.is_disconnect() => {
                        debug!(error = %e, "transport read failed");
                        true
                    }
                    _ => {
                        // Timeout or transient error: yield briefly so the
                        // loop can service requests.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        false
                    }
                }
            } => {
                if lost {
                    break Exit::Lost;
                }
            }
        }
    };

    finish(&mut correlator, &shared);
    let _ = transport.close().await;
    if matches!(exit, Exit::Lost) {
        tracing::info!("S4 transport lost");
    }
}

/// Common teardown: fail pending polls, mark closed, announce it.
fn finish(correlator: &mut Correlator, shared: &MonitorShared) {
    let failed = correlator.fail_all();
    if failed > 0 {
        debug!(failed, "failed pending polls on disconnect");
    }
    shared.open.store(false, Ordering::SeqCst);
    let _ = shared.channels.lifecycle.send(MonitorEvent::Disconnected);
}

/// Dispatch one caller request. Returns `true` if the write showed the
/// transport is gone; the caller has already been given the error.
async fn handle_request(
    req: Request,
    transport: &mut dyn Transport,
    correlator: &mut Correlator,
) -> bool {
    match req {
        Request::Send { payload, reply } => {
            trace!(payload, "write");
            let result = transport.send(&protocol::encode_line(&payload)).await;
            let lost = result.as_ref().is_err_and(Error::is_disconnect);
            let _ = reply.send(result);
            lost
        }
        Request::Poll {
            name,
            payload,
            timeout,
            reply,
        } => {
            trace!(payload, "write");
            match transport.send(&protocol::encode_line(&payload)).await {
                Ok(()) => {
                    let deadline = deadline_after(Instant::now(), timeout);
                    let id = correlator.register(name, deadline, reply);
                    trace!(id, pending = correlator.len(), "poll registered");
                    false
                }
                Err(e) => {
                    let lost = e.is_disconnect();
                    let _ = reply.send(Err(e));
                    lost
                }
            }
        }
        Request::Shutdown { .. } => unreachable!("Shutdown handled in io_loop"),
    }
}

// ---------------------------------------------------------------------------
// Inbound frame processing
// ---------------------------------------------------------------------------

/// Append received bytes and process the complete lines. A partial line
/// that outgrows `MAX_BUF` is discarded.
fn ingest(buf: &mut Vec<u8>, data: &[u8], shared: &MonitorShared, correlator: &mut Correlator) {
    buf.extend_from_slice(data);
    process_lines(buf, shared, correlator);
    if buf.len() > MAX_BUF {
        tracing::warn!(len = buf.len(), "line buffer overflow, resetting");
        buf.clear();
    }
}

/// Process every complete line in `buf`. Incomplete data is left buffered.
fn process_lines(buf: &mut Vec<u8>, shared: &MonitorShared, correlator: &mut Correlator) {
    loop {
        match protocol::decode_line(buf) {
            DecodeResult::Line { line, consumed } => {
                buf.drain(..consumed);
                if line.is_empty() {
                    continue;
                }
                trace!(line, "read");
                dispatch_frame(protocol::classify(&line), shared, correlator);
            }
            DecodeResult::Invalid(consumed) => {
                buf.drain(..consumed);
                debug!(consumed, "dropping non-UTF-8 line");
            }
            DecodeResult::Incomplete => break,
        }
    }
}

/// Publish one classified frame on its category channel.
fn dispatch_frame(frame: Frame, shared: &MonitorShared, correlator: &mut Correlator) {
    let channels = &shared.channels;
    match frame {
        Frame::Ping => {
            let _ = channels.pings.send(Marker::now());
        }
        Frame::Pulse(count) => {
            let _ = channels.pulses.send(count);
        }
        Frame::Error => {
            debug!("monitor reported ERROR");
            let _ = channels.errors.send(Marker::now());
        }
        Frame::StrokeStart => {
            let _ = channels.strokes.send(StrokeEvent::Start);
        }
        Frame::StrokeEnd => {
            let _ = channels.strokes.send(StrokeEvent::End);
        }
        Frame::DataValue { .. } => match decoder::decode_frame(&shared.registry, &frame) {
            Some(Ok(reading)) => {
                shared
                    .live
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .apply(&reading);
                correlator.fulfil(&reading.name, reading.value, Instant::now());
                let _ = channels.readings.send(reading);
            }
            Some(Err(e)) => debug!(error = %e, "dropping data value"),
            None => {}
        },
        Frame::Hello => debug!("monitor acknowledged session"),
        Frame::Ack => trace!("monitor ack"),
        Frame::Unrecognized(line) => trace!(line, "ignoring unrecognized frame"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
