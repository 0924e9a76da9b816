//! Channel engine.
//!
//! Owns the connection lifecycle and all mutable driver state behind one lock:
//! motion bytes, the in-flight report, per-tier dispatch times, the waiter table
//! for synchronous requests, and the aggregate report. Two tasks run while the
//! channel is open:
//!
//! - the writer loop, which writes exactly one frame per tick (a parameter request
//!   while a report is being polled, otherwise a plain motor command), and
//! - the reader, which splits the inbound stream into frames and dispatches them to
//!   the active report and to any waiters.

use futures::StreamExt;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{self, InboundCodec, OutboundFrame};
use crate::config::{ChannelConfig, SerialConfig};
use crate::error::{Result, RoverError};
use crate::report::{Report, ReportAssembler};
use crate::serial;
use crate::types::{Frame, MotorState, Param, PollingTier};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type Waiter = oneshot::Sender<Result<Frame>>;

/// Notifications published to subscribers
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Every decoded inbound frame, including ones nobody asked for
    Frame(Frame),
    /// A tiered report completed and was merged into the aggregate
    Report(Report),
    /// An incomplete report was dropped after `report_timeout`
    ReportAbandoned {
        tier: PollingTier,
        missing: Vec<Param>,
    },
    TransportError(String),
    Closed,
}

/// Channel lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed, not yet opened
    Idle,
    Open,
    /// Closed for good; a channel is never reopened
    Closed,
}

struct ActiveReport {
    assembler: ReportAssembler,
    last_request: Instant,
}

/// Last dispatch time per polling tier. `None` means never dispatched, i.e. due.
#[derive(Default)]
struct TierSchedule {
    fast: Option<Instant>,
    medium: Option<Instant>,
    slow: Option<Instant>,
}

impl TierSchedule {
    fn slot(&mut self, tier: PollingTier) -> Option<&mut Option<Instant>> {
        match tier {
            PollingTier::Fast => Some(&mut self.fast),
            PollingTier::Medium => Some(&mut self.medium),
            PollingTier::Slow => Some(&mut self.slow),
            PollingTier::Aggregate => None,
        }
    }

    /// Broadest tier whose interval has elapsed. Selecting it also resets every tier it subsumes.
    fn take_due(&mut self, config: &ChannelConfig, now: Instant) -> Option<PollingTier> {
        let due = [PollingTier::Slow, PollingTier::Medium, PollingTier::Fast]
            .into_iter()
            .find(|&tier| {
                let last = self.slot(tier).and_then(|slot| *slot);
                match (last, config.tier_interval(tier)) {
                    (None, _) => true,
                    (Some(last), Some(interval)) => now.duration_since(last) >= interval,
                    (Some(_), None) => false,
                }
            })?;

        for &tier in due.subsumed() {
            if let Some(slot) = self.slot(tier) {
                *slot = Some(now);
            }
        }
        Some(due)
    }
}

struct EngineState {
    lifecycle: ChannelState,
    motors: MotorState,
    active: Option<ActiveReport>,
    schedule: TierSchedule,
    waiters: HashMap<Param, Vec<Waiter>>,
    aggregate: Report,
}

impl EngineState {
    fn ensure_open(&self) -> Result<()> {
        match self.lifecycle {
            ChannelState::Open => Ok(()),
            ChannelState::Idle => Err(RoverError::NotOpen),
            ChannelState::Closed => Err(RoverError::ChannelClosed),
        }
    }
}

struct Shared {
    config: ChannelConfig,
    state: Mutex<EngineState>,
    writer: tokio::sync::Mutex<BoxedWriter>,
    events: broadcast::Sender<ChannelEvent>,
    cancel: CancellationToken,
    /// Set while writes keep failing; only the first failure of a run is published
    write_faulted: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChannelEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Write one whole frame. Frames from different callers never interleave.
    async fn write_frame(&self, frame: &OutboundFrame) -> Result<()> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(frame).await?;
            writer.flush().await
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(RoverError::ChannelClosed),
            result = write => match result {
                Ok(()) => {
                    if self.write_faulted.swap(false, Ordering::AcqRel) {
                        debug!("transport writes recovered");
                    }
                    trace!(tx = %codec::hex(frame), "frame sent");
                    Ok(())
                }
                Err(e) => {
                    if self.write_faulted.swap(true, Ordering::AcqRel) {
                        trace!(error = %e, "transport write still failing");
                    } else {
                        warn!(error = %e, "transport write failed");
                        self.emit(ChannelEvent::TransportError(e.to_string()));
                    }
                    Err(e.into())
                }
            },
        }
    }

    /// Pick the frame for this tick, starting a report first if one is due.
    fn next_outbound(&self, now: Instant) -> OutboundFrame {
        let mut abandoned = None;

        let frame = {
            let mut guard = self.state();
            let state = &mut *guard;

            let stalled = match (&state.active, self.config.report_timeout()) {
                (Some(active), Some(timeout)) => {
                    active.assembler.is_exhausted()
                        && now.duration_since(active.last_request) >= timeout
                }
                _ => false,
            };
            if stalled {
                if let Some(active) = state.active.take() {
                    abandoned = Some((active.assembler.tier(), active.assembler.missing()));
                }
            }

            if state.active.is_none() {
                if let Some(tier) = state.schedule.take_due(&self.config, now) {
                    debug!(?tier, "starting report");
                    state.active = Some(ActiveReport {
                        assembler: ReportAssembler::new(tier),
                        last_request: now,
                    });
                }
            }

            let request = state.active.as_mut().and_then(|active| {
                let param = active.assembler.next_request()?;
                active.last_request = now;
                Some(param)
            });

            match request {
                Some(param) => codec::encode_request(state.motors, param),
                None => codec::encode_command(state.motors),
            }
        };

        if let Some((tier, missing)) = abandoned {
            warn!(?tier, missing = missing.len(), "report abandoned");
            self.emit(ChannelEvent::ReportAbandoned { tier, missing });
        }
        frame
    }

    /// Route one inbound frame to observers, the active report, and waiters.
    fn dispatch(&self, frame: Frame) {
        trace!(id = frame.id, value = frame.value, "frame received");
        self.emit(ChannelEvent::Frame(frame));

        let Some(param) = frame.param() else {
            debug!(id = frame.id, "ignoring frame for unknown parameter");
            return;
        };

        let (completed, waiters) = {
            let mut guard = self.state();
            let state = &mut *guard;

            let completed = state
                .active
                .as_mut()
                .and_then(|active| active.assembler.submit(frame));
            if let Some(report) = &completed {
                state.aggregate.merge(report);
                state.active = None;
            }

            (completed, state.waiters.remove(&param).unwrap_or_default())
        };

        for waiter in waiters {
            let _ = waiter.send(Ok(frame));
        }

        if let Some(report) = completed {
            debug!(tier = ?report.tier, params = report.len(), "report complete");
            self.emit(ChannelEvent::Report(report));
        }
    }

    /// Drop waiters whose caller has gone away
    fn prune_waiters(&self, param: Param) {
        let mut state = self.state();
        if let Some(waiters) = state.waiters.get_mut(&param) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                state.waiters.remove(&param);
            }
        }
    }
}

/// Registered waiter for one `request_param` call.
///
/// Dropping it, however the call ends, removes the entry from the waiter table.
struct PendingRequest<'a> {
    shared: &'a Shared,
    param: Param,
    rx: oneshot::Receiver<Result<Frame>>,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.rx.close();
        self.shared.prune_waiters(self.param);
    }
}

async fn run_writer(shared: Arc<Shared>) {
    let mut ticker = time::interval(shared.config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let frame = shared.next_outbound(Instant::now());
        // Failures are already published; the next tick sends a fresh frame
        if let Err(RoverError::ChannelClosed) = shared.write_frame(&frame).await {
            break;
        }
    }
    debug!("writer loop stopped");
}

async fn run_reader(shared: Arc<Shared>, reader: BoxedReader) {
    let mut frames = FramedRead::new(reader, InboundCodec);

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            next = frames.next() => match next {
                Some(Ok(frame)) => shared.dispatch(frame),
                Some(Err(e)) => {
                    warn!(error = %e, "transport read failed");
                    shared.emit(ChannelEvent::TransportError(e.to_string()));
                    break;
                }
                None => {
                    debug!("transport reached end of stream");
                    shared.emit(ChannelEvent::TransportError("transport closed".to_string()));
                    break;
                }
            },
        }
    }
    debug!("reader stopped");
}

/// Client side of one rover link.
///
/// ```no_run
/// use rover_protocol::{ChannelConfig, Param, RoverChannel, SerialConfig};
///
/// #[tokio::main]
/// async fn main() -> rover_protocol::Result<()> {
///     let channel = RoverChannel::open_serial(&SerialConfig::new("/dev/ttyUSB0"), ChannelConfig::default())?;
///     channel.open()?;
///     channel.set_both(150, 150);
///     let build = channel.request_param(Param::FirmwareBuild).await?;
///     println!("firmware build {}", build.value);
///     channel.close().await
/// }
/// ```
pub struct RoverChannel {
    shared: Arc<Shared>,
    reader: Mutex<Option<BoxedReader>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RoverChannel {
    /// Wrap any byte stream. Nothing is read or written until `open()`.
    pub fn new<T>(transport: T, config: ChannelConfig) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;

        let (reader, writer) = tokio::io::split(transport);
        let (events, _) = broadcast::channel(config.event_capacity);

        let shared = Shared {
            state: Mutex::new(EngineState {
                lifecycle: ChannelState::Idle,
                motors: MotorState::default(),
                active: None,
                schedule: TierSchedule::default(),
                waiters: HashMap::new(),
                aggregate: Report::empty(),
            }),
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            events,
            cancel: CancellationToken::new(),
            write_faulted: AtomicBool::new(false),
            config,
        };

        Ok(RoverChannel {
            shared: Arc::new(shared),
            reader: Mutex::new(Some(Box::new(reader))),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Open the serial port described by `serial` and wrap it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_serial(serial: &SerialConfig, config: ChannelConfig) -> Result<Self> {
        let port = serial::open_port(serial)?;
        Self::new(port, config)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state().lifecycle
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    /// Start the writer loop and the reader.
    ///
    /// Fails with `AlreadyOpen` on a repeated call and `ChannelClosed` after `close()`.
    pub fn open(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RoverError::Io(io::Error::other(e)))?;

        {
            let mut state = self.shared.state();
            match state.lifecycle {
                ChannelState::Idle => {}
                ChannelState::Open => return Err(RoverError::AlreadyOpen),
                ChannelState::Closed => return Err(RoverError::ChannelClosed),
            }
            state.lifecycle = ChannelState::Open;
        }

        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RoverError::ChannelClosed)?;

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(runtime.spawn(run_reader(self.shared.clone(), reader)));
        tasks.push(runtime.spawn(run_writer(self.shared.clone())));

        debug!("channel opened");
        Ok(())
    }

    /// Stop both tasks and fail every pending `request_param` with `ChannelClosed`.
    pub async fn close(&self) -> Result<()> {
        let waiters = {
            let mut state = self.shared.state();
            match state.lifecycle {
                ChannelState::Open => {}
                ChannelState::Idle => return Err(RoverError::NotOpen),
                ChannelState::Closed => return Err(RoverError::ChannelClosed),
            }
            state.lifecycle = ChannelState::Closed;
            state.active = None;
            std::mem::take(&mut state.waiters)
        };

        self.shared.cancel.cancel();

        for waiter in waiters.into_values().flatten() {
            let _ = waiter.send(Err(RoverError::ChannelClosed));
        }

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "channel task ended abnormally");
            }
        }

        if let Err(e) = self.shared.writer.lock().await.shutdown().await {
            debug!(error = %e, "transport shutdown failed");
        }

        debug!("channel closed");
        self.shared.emit(ChannelEvent::Closed);
        Ok(())
    }

    /// Current motion bytes
    pub fn motors(&self) -> MotorState {
        self.shared.state().motors
    }

    /// Takes effect on the next frame written
    pub fn set_left(&self, left: u8) {
        self.shared.state().motors.left = left;
    }

    pub fn set_right(&self, right: u8) {
        self.shared.state().motors.right = right;
    }

    pub fn set_both(&self, left: u8, right: u8) {
        let mut state = self.shared.state();
        state.motors.left = left;
        state.motors.right = right;
    }

    pub fn set_flipper(&self, flipper: u8) {
        self.shared.state().motors.flipper = flipper;
    }

    /// Send a speed mode toggle right away, outside the writer loop.
    pub async fn set_low_speed_mode(&self, slow: bool) -> Result<()> {
        let frame = {
            let state = self.shared.state();
            state.ensure_open()?;
            codec::encode_speed_mode(state.motors, slow)
        };
        debug!(slow, "setting low speed mode");
        self.shared.write_frame(&frame).await
    }

    /// Request one parameter directly and wait for the rover's next frame for it.
    ///
    /// Fails with `Timeout` after `request_timeout` and with `ChannelClosed` if the
    /// channel closes first. Dropping the returned future withdraws the request.
    pub async fn request_param(&self, param: Param) -> Result<Frame> {
        let (tx, rx) = oneshot::channel();

        let frame = {
            let mut state = self.shared.state();
            state.ensure_open()?;
            state.waiters.entry(param).or_default().push(tx);
            codec::encode_request(state.motors, param)
        };
        let mut pending = PendingRequest {
            shared: &self.shared,
            param,
            rx,
        };

        self.shared.write_frame(&frame).await?;

        let outcome = time::timeout(self.shared.config.request_timeout(), &mut pending.rx).await;
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RoverError::ChannelClosed),
            Err(_) => {
                debug!(?param, "parameter request timed out");
                Err(RoverError::Timeout)
            }
        }
    }

    /// Last known value of every parameter received so far through completed reports
    pub fn last_report(&self) -> Report {
        self.shared.state().aggregate.clone()
    }

    pub fn latest(&self, param: Param) -> Option<Frame> {
        self.shared.state().aggregate.get(param)
    }

    /// Number of callers currently waiting on `param`
    pub fn pending_requests(&self, param: Param) -> usize {
        self.shared
            .state()
            .waiters
            .get(&param)
            .map_or(0, Vec::len)
    }
}

impl Drop for RoverChannel {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
