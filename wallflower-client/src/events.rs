//! Event callback surface.
//!
//! Callers observe the adapter through assignable callback slots, each of
//! which may be absent (firing an absent slot is a no-op). Slots live
//! behind a mutex shared between the caller-facing handle and the driver
//! task, so a handler can be installed or replaced at any time — including
//! from inside another handler: a slot is taken out of the lock for the
//! duration of its call.
//!
//! Firing order per handshake: `open` strictly before `setup`; `setup` at
//! most once per connection attempt; `message` never before `setup`.

use parking_lot::Mutex;

use crate::error::ClientError;

/// Delivered once per handshake, after `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupEvent {
    /// The identifier the host assigned this client.
    pub client_id: String,
    /// The session leader announced so far, if any.
    pub leader_id: Option<String>,
    /// Whether this client is currently the announced leader.
    pub is_leader: bool,
}

/// Delivered when the connection ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
}

type OpenFn = Box<dyn FnMut() + Send>;
type MessageFn = Box<dyn FnMut(String) + Send>;
type CloseFn = Box<dyn FnMut(CloseEvent) + Send>;
type ErrorFn = Box<dyn FnMut(ClientError) + Send>;
type SetupFn = Box<dyn FnMut(SetupEvent) + Send>;
type LeaderDisconnectFn = Box<dyn FnMut(u32) + Send>;

#[derive(Default)]
struct Handlers {
    open: Option<OpenFn>,
    message: Option<MessageFn>,
    close: Option<CloseFn>,
    error: Option<ErrorFn>,
    setup: Option<SetupFn>,
    leader_disconnect: Option<LeaderDisconnectFn>,
}

/// The shared callback slots.
#[derive(Default)]
pub(crate) struct EventSinks {
    handlers: Mutex<Handlers>,
}

macro_rules! slot {
    ($set:ident, $fire:ident, $slot:ident, ($($arg:ident: $ty:ty),*)) => {
        pub fn $set(&self, f: impl FnMut($($ty),*) + Send + 'static) {
            self.handlers.lock().$slot = Some(Box::new(f));
        }

        pub fn $fire(&self, $($arg: $ty),*) {
            let taken = self.handlers.lock().$slot.take();
            if let Some(mut f) = taken {
                f($($arg),*);
                // Keep the handler unless the callback installed a new one.
                let mut guard = self.handlers.lock();
                if guard.$slot.is_none() {
                    guard.$slot = Some(f);
                }
            }
        }
    };
}

impl EventSinks {
    slot!(set_open, open, open, ());
    slot!(set_message, message, message, (data: String));
    slot!(set_close, close, close, (event: CloseEvent));
    slot!(set_error, error, error, (error: ClientError));
    slot!(set_setup, setup, setup, (event: SetupEvent));
    slot!(set_leader_disconnect, leader_disconnect, leader_disconnect, (retry_count: u32));
}
