//! Connection state machine and the leader-avoidance loop.
//!
//! A single driver task owns the socket, the queue of frames awaiting an
//! open socket, and the retry state. Caller commands (`send`, `close`)
//! arrive over an unbounded channel; everything the caller may read
//! (ready state, buffered byte count, the session/connection/leader ids)
//! lives in [`Shared`] behind atomics and a lock.
//!
//! The host designates one client per session as the leader and expects it
//! to run authoritative logic. This adapter is a library client, so on
//! every election announcing itself it abandons the session: tear down,
//! wait a jittered exponential backoff, rotate to a fresh session id, and
//! reconnect — up to `max_retries` times, after which it closes for good.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use wallflower_protocol::frame::{self, Inbound};
use wallflower_protocol::session;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{CloseEvent, EventSinks, SetupEvent};
use crate::socket::{Socket, SocketEvent, CLOSE_ABNORMAL};

/// How often the driver re-examines the socket's state outside of events.
/// Covers implementations that do not report transitional states.
const READY_STATE_POLL: Duration = Duration::from_millis(100);

/// How many poll ticks to wait for the peer to acknowledge a close before
/// finalizing unilaterally.
const CLOSE_SETTLE_TICKS: u32 = 10;

/// Upper bound of the uniform jitter added to every reconnect delay.
const RETRY_JITTER_MAX_MS: f64 = 1000.0;

/// Connection ready state, in the WebSocket numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Identifiers observed over the lifetime of the connection.
#[derive(Debug, Default)]
pub(crate) struct Ids {
    pub session_id: String,
    /// Assigned by the host in the handshake frame; `client_id` mirrors it.
    pub connection_id: Option<String>,
    pub client_id: Option<String>,
    pub leader_id: Option<String>,
}

/// State shared between the caller-facing handle and the driver task.
pub(crate) struct Shared {
    ready_state: AtomicU8,
    /// Bytes of framed messages queued while connecting.
    pub buffered: AtomicUsize,
    pub retry_count: AtomicU32,
    pub ids: RwLock<Ids>,
    pub sinks: EventSinks,
}

impl Shared {
    pub fn new(session_id: String) -> Self {
        Self {
            ready_state: AtomicU8::new(ReadyState::Connecting as u8),
            buffered: AtomicUsize::new(0),
            retry_count: AtomicU32::new(0),
            ids: RwLock::new(Ids {
                session_id,
                ..Ids::default()
            }),
            sinks: EventSinks::default(),
        }
    }

    pub fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::Release);
    }
}

/// Commands from the caller-facing handle.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Close { code: u16, reason: String },
}

/// Outcome of a single connection attempt.
enum Attempt {
    Retry(Duration),
    Finished,
}

pub(crate) struct Driver {
    url: String,
    config: ClientConfig,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Frames awaiting an open socket, drained FIFO on open.
    queue: VecDeque<String>,
    /// Whether the setup callback fired for the current attempt.
    setup_called: bool,
    /// Cookie to send verbatim on the first upgrade, when configured.
    cookie_override: Option<String>,
}

impl Driver {
    pub fn new(
        url: String,
        config: ClientConfig,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let cookie_override = config.cookie.clone();
        Self {
            url,
            config,
            shared,
            commands,
            queue: VecDeque::new(),
            setup_called: false,
            cookie_override,
        }
    }

    pub async fn run(mut self) {
        let mut delay = uniform_delay(self.config.initial_delay_max);
        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            "spreading initial connect"
        );
        loop {
            if !self.wait(delay).await {
                return;
            }
            match self.attempt().await {
                Attempt::Retry(next) => delay = next,
                Attempt::Finished => return,
            }
        }
    }

    /// Sleeps for `delay` while still servicing caller commands. Returns
    /// `false` when the connection was closed during the wait.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(data)) => {
                        if self.shared.retry_count.load(Ordering::Relaxed) > 0 {
                            // Mid leader-avoidance: the fresh session must
                            // not inherit traffic from the abandoned one.
                            tracing::debug!("dropping send during retry window");
                        } else {
                            self.enqueue(&data);
                        }
                    }
                    Some(Command::Close { code, reason }) => {
                        tracing::debug!("closed before connect");
                        self.finish_closed(code, &reason);
                        return false;
                    }
                    None => {
                        self.teardown();
                        self.shared.set_state(ReadyState::Closed);
                        return false;
                    }
                },
            }
        }
    }

    /// One connection attempt: connect, drain the queue, then service the
    /// socket and caller commands until something ends the attempt.
    async fn attempt(&mut self) -> Attempt {
        if self.shared.retry_count.load(Ordering::Relaxed) > 0 {
            self.rotate_session();
        }
        self.shared.set_state(ReadyState::Connecting);

        let cookie = match self.cookie_override.take() {
            Some(cookie) => cookie,
            None => session::session_cookie(&self.shared.ids.read().session_id),
        };
        tracing::debug!(url = %self.url, "connecting");
        let mut socket = match Socket::connect(&self.url, &cookie, &self.config.protocols).await {
            Ok(socket) => socket,
            Err(error) => {
                tracing::debug!(error = %error, "connect failed");
                self.shared.sinks.error(error);
                self.finish_closed(CLOSE_ABNORMAL, "connect failed");
                return Attempt::Finished;
            }
        };

        self.shared.set_state(ReadyState::Open);
        if !self.queue.is_empty() {
            tracing::debug!(frames = self.queue.len(), "draining queued frames");
        }
        while let Some(framed) = self.queue.pop_front() {
            self.shared.buffered.fetch_sub(framed.len(), Ordering::Relaxed);
            if let Err(error) = socket.send_text(&framed).await {
                self.shared.sinks.error(error);
            }
        }

        let mut poll = tokio::time::interval(READY_STATE_POLL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending_close: Option<(u16, String)> = None;
        let mut closing_ticks = 0u32;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(data)) => self.send_now(&mut socket, &data).await,
                    Some(Command::Close { code, reason }) => {
                        tracing::debug!(code, "closing at caller request");
                        self.shared.set_state(ReadyState::Closing);
                        socket.close(code, &reason).await;
                        pending_close.get_or_insert((code, reason));
                    }
                    None => {
                        socket.close(1001, "").await;
                        self.teardown();
                        self.shared.set_state(ReadyState::Closed);
                        return Attempt::Finished;
                    }
                },
                event = socket.next() => match event {
                    Some(Ok(SocketEvent::Text(text))) => {
                        if let Some(outcome) = self.handle_frame(&mut socket, &text).await {
                            return outcome;
                        }
                    }
                    Some(Ok(SocketEvent::Closed { code, reason })) => {
                        // Close handshake observed; the stream ends next.
                        pending_close.get_or_insert((code, reason));
                    }
                    Some(Err(error)) => {
                        // Socket errors pass through to the caller; they do
                        // not touch the retry state.
                        tracing::debug!(error = %error, "socket error");
                        self.shared.sinks.error(error);
                    }
                    None => {
                        let (code, reason) =
                            pending_close.take().unwrap_or((CLOSE_ABNORMAL, String::new()));
                        self.finish_closed(code, &reason);
                        return Attempt::Finished;
                    }
                },
                _ = poll.tick() => {
                    if self.shared.state() == ReadyState::Closing {
                        closing_ticks += 1;
                        if closing_ticks >= CLOSE_SETTLE_TICKS {
                            tracing::debug!("close handshake never settled, finalizing");
                            let (code, reason) =
                                pending_close.take().unwrap_or((1000, String::new()));
                            self.finish_closed(code, &reason);
                            return Attempt::Finished;
                        }
                    }
                }
            }
        }
    }

    /// Dispatches one classified inbound frame. `Some` ends the attempt.
    async fn handle_frame(&mut self, socket: &mut Socket, text: &str) -> Option<Attempt> {
        match frame::classify_frame(text, self.config.variant_tag) {
            Inbound::Election { leader_id } => self.handle_election(socket, leader_id).await,
            Inbound::Message { data, .. } => {
                if self.setup_called {
                    self.shared.sinks.message(data);
                } else {
                    tracing::debug!("discarding application message before setup");
                }
                None
            }
            Inbound::Control {
                data,
                connection_id,
                ..
            } => {
                if self.config.debug {
                    tracing::debug!(frame = %data, "protocol frame");
                }
                self.handle_control(connection_id);
                None
            }
            Inbound::ParseError { raw } => {
                tracing::debug!(raw, "unparseable inbound frame");
                None
            }
        }
    }

    /// The first protocol frame carrying a connection id is the handshake.
    fn handle_control(&mut self, connection_id: Option<String>) {
        let Some(connection_id) = connection_id.filter(|id| !id.is_empty()) else {
            return;
        };
        let leader_id = {
            let mut ids = self.shared.ids.write();
            if ids.connection_id.is_some() {
                return;
            }
            ids.connection_id = Some(connection_id.clone());
            ids.client_id = Some(connection_id.clone());
            ids.leader_id.clone()
        };

        if self.shared.retry_count.swap(0, Ordering::Relaxed) > 0 {
            tracing::debug!("handshake reached, retry counter reset");
        }
        tracing::debug!(connection_id = %connection_id, "handshake complete");

        self.shared.sinks.open();
        if !self.setup_called {
            self.setup_called = true;
            let is_leader = leader_id.as_deref() == Some(connection_id.as_str());
            self.shared.sinks.setup(SetupEvent {
                client_id: connection_id,
                leader_id,
                is_leader,
            });
        }
    }

    /// Re-evaluates leadership on every election frame. `Some` ends the
    /// attempt (reconnect under a fresh session, or give up).
    async fn handle_election(
        &mut self,
        socket: &mut Socket,
        leader_id: Option<String>,
    ) -> Option<Attempt> {
        let (previous, i_am_leader) = {
            let mut ids = self.shared.ids.write();
            let previous = ids.leader_id.clone();
            // Option equality on purpose: an election without a leader
            // value matches a client that has not yet handshaken, which is
            // what lets pre-handshake elections exhaust the retry budget.
            let i_am_leader = ids.client_id == leader_id;
            ids.leader_id = leader_id.clone();
            (previous, i_am_leader)
        };
        tracing::debug!(?previous, new = ?leader_id, i_am_leader, "leader election");

        if !i_am_leader {
            return None;
        }

        // Elected leader. The host expects the leader to run authoritative
        // session logic, which a library client cannot do; abandon this
        // session and come back as a follower under a fresh one.
        let retry_count = self.shared.retry_count.fetch_add(1, Ordering::Relaxed) + 1;
        socket.close(1000, "").await;
        self.teardown();

        if retry_count <= self.config.max_retries {
            let delay = retry_delay(
                retry_count,
                self.config.retry_base_delay,
                self.config.retry_max_delay,
            );
            tracing::debug!(
                retry_count,
                delay_ms = delay.as_millis() as u64,
                "elected leader, reconnecting under a fresh session"
            );
            self.shared.set_state(ReadyState::Connecting);
            Some(Attempt::Retry(delay))
        } else {
            tracing::warn!(retry_count, "leader avoidance retries exhausted");
            self.shared.set_state(ReadyState::Closed);
            self.shared.sinks.leader_disconnect(retry_count);
            Some(Attempt::Finished)
        }
    }

    /// Frames and transmits immediately (the socket is open).
    async fn send_now(&mut self, socket: &mut Socket, data: &str) {
        if self.shared.state() != ReadyState::Open {
            tracing::debug!("discarding send while not open");
            return;
        }
        match self.frame_outbound(data) {
            Ok(framed) => {
                if let Err(error) = socket.send_text(&framed).await {
                    self.shared.sinks.error(error);
                }
            }
            Err(error) => self.shared.sinks.error(error),
        }
    }

    /// Frames and queues for the next open socket.
    fn enqueue(&mut self, data: &str) {
        match self.frame_outbound(data) {
            Ok(framed) => {
                self.shared.buffered.fetch_add(framed.len(), Ordering::Relaxed);
                self.queue.push_back(framed);
            }
            Err(error) => self.shared.sinks.error(error),
        }
    }

    fn frame_outbound(&self, data: &str) -> Result<String, ClientError> {
        let ids = self.shared.ids.read();
        Ok(frame::encode_frame(
            data,
            self.config.variant_tag,
            &ids.session_id,
            ids.connection_id.as_deref(),
        )?)
    }

    fn rotate_session(&mut self) {
        let fresh = session::generate_session_id();
        tracing::debug!(session_id = %fresh, "rotating session");
        self.shared.ids.write().session_id = fresh;
        self.setup_called = false;
    }

    /// Discards the queue and forgets every identifier tied to the old
    /// connection.
    fn teardown(&mut self) {
        self.queue.clear();
        self.shared.buffered.store(0, Ordering::Relaxed);
        let mut ids = self.shared.ids.write();
        ids.connection_id = None;
        ids.client_id = None;
        ids.leader_id = None;
    }

    fn finish_closed(&mut self, code: u16, reason: &str) {
        self.teardown();
        self.shared.set_state(ReadyState::Closed);
        tracing::debug!(code, reason, "connection closed");
        self.shared.sinks.close(CloseEvent {
            code,
            reason: reason.to_owned(),
        });
    }
}

/// Reconnect delay for the given (already incremented) retry count:
/// `min(max, base * 1.5^(count-1) + U(0, 1s))`.
fn retry_delay(retry_count: u32, base: Duration, max: Duration) -> Duration {
    let exponent = retry_count.saturating_sub(1).min(64) as i32;
    let backoff = base.as_millis() as f64 * 1.5f64.powi(exponent);
    let jitter = rand::rng().random_range(0.0..RETRY_JITTER_MAX_MS);
    Duration::from_millis((backoff + jitter).min(max.as_millis() as f64) as u64)
}

/// Uniform random delay in [0, max].
fn uniform_delay(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max.as_millis() as u64))
}
