//! The caller-facing adapter handle.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;

use wallflower_protocol::session;

use crate::config::ClientConfig;
use crate::connection::{Command, Driver, ReadyState, Shared};
use crate::error::ClientError;
use crate::events::{CloseEvent, SetupEvent};

/// Close code for a caller close that names no code.
const CLOSE_NORMAL: u16 = 1000;

/// A WebSocket-like client for the host protocol.
///
/// Constructing a `Client` spawns a driver task on the ambient tokio
/// runtime and returns immediately with the connection in
/// [`ReadyState::Connecting`]; callbacks deliver everything that happens
/// afterwards. Dropping the handle stops the driver and closes the socket.
pub struct Client {
    url: String,
    max_retries: u32,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Client {
    /// Creates the adapter and starts connecting to `url`.
    ///
    /// The session identifier comes from `config.session_id` if set, else
    /// from the `sid` attribute of `config.cookie` if present, else it is
    /// freshly generated. Must be called within a tokio runtime.
    pub fn new(url: impl Into<String>, config: ClientConfig) -> Self {
        let url = url.into();
        let session_id = config
            .session_id
            .clone()
            .or_else(|| {
                config
                    .cookie
                    .as_deref()
                    .and_then(session::session_from_cookie)
                    .map(str::to_owned)
            })
            .unwrap_or_else(session::generate_session_id);

        let shared = Arc::new(Shared::new(session_id));
        let (commands, receiver) = mpsc::unbounded_channel();
        let driver = Driver::new(url.clone(), config.clone(), Arc::clone(&shared), receiver);
        tokio::spawn(driver.run());

        Self {
            url,
            max_retries: config.max_retries,
            shared,
            commands,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Bytes of framed messages queued while the socket is connecting.
    pub fn buffered_amount(&self) -> usize {
        self.shared.buffered.load(Ordering::Relaxed)
    }

    pub fn session_id(&self) -> String {
        self.shared.ids.read().session_id.clone()
    }

    /// The identifier the host assigned in the handshake, if one arrived.
    pub fn connection_id(&self) -> Option<String> {
        self.shared.ids.read().connection_id.clone()
    }

    /// Alias of [`Self::connection_id`] in this adapter.
    pub fn client_id(&self) -> Option<String> {
        self.shared.ids.read().client_id.clone()
    }

    /// The leader announced by the most recent election, if any.
    pub fn leader_id(&self) -> Option<String> {
        self.shared.ids.read().leader_id.clone()
    }

    /// Sends an application payload.
    ///
    /// While the socket is connecting the frame is queued and drained, in
    /// order, the moment it opens. During a leader-avoidance retry window
    /// the payload is silently dropped — the fresh session must not be
    /// perturbed by traffic meant for the abandoned one. In any other
    /// non-open state this fails with [`ClientError::NotOpen`].
    pub fn send(&self, data: &str) -> Result<(), ClientError> {
        let retry_count = self.shared.retry_count.load(Ordering::Relaxed);
        if retry_count > 0 && retry_count <= self.max_retries {
            tracing::debug!("dropping send during leader-avoidance retry");
            return Ok(());
        }
        match self.ready_state() {
            ReadyState::Connecting | ReadyState::Open => self
                .commands
                .send(Command::Send(data.to_owned()))
                .map_err(|_| ClientError::Closed),
            state => Err(ClientError::NotOpen(state)),
        }
    }

    /// Closes the connection. The ready state is observed as
    /// [`ReadyState::Closing`] immediately; the socket settles
    /// asynchronously and `on_close` fires when it has.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        if matches!(
            self.ready_state(),
            ReadyState::Connecting | ReadyState::Open
        ) {
            self.shared.set_state(ReadyState::Closing);
        }
        let command = Command::Close {
            code: code.unwrap_or(CLOSE_NORMAL),
            reason: reason.unwrap_or_default().to_owned(),
        };
        if self.commands.send(command).is_err() {
            // Driver already gone; nothing left to settle.
            self.shared.set_state(ReadyState::Closed);
        }
    }

    pub fn on_open(&self, f: impl FnMut() + Send + 'static) {
        self.shared.sinks.set_open(f);
    }

    pub fn on_message(&self, f: impl FnMut(String) + Send + 'static) {
        self.shared.sinks.set_message(f);
    }

    pub fn on_close(&self, f: impl FnMut(CloseEvent) + Send + 'static) {
        self.shared.sinks.set_close(f);
    }

    pub fn on_error(&self, f: impl FnMut(ClientError) + Send + 'static) {
        self.shared.sinks.set_error(f);
    }

    pub fn on_setup(&self, f: impl FnMut(SetupEvent) + Send + 'static) {
        self.shared.sinks.set_setup(f);
    }

    pub fn on_leader_disconnect(&self, f: impl FnMut(u32) + Send + 'static) {
        self.shared.sinks.set_leader_disconnect(f);
    }
}
