use crate::error::GameError;
use crate::event::{Button, Event, EventKind, MessageHandle};
use crate::game::OwnerId;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Number of boxes per row in the distribution grid.
pub const BOX_COLUMNS: usize = 4;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("user {0} is not connected")]
    NotConnected(OwnerId),
    #[error("message {0} does not exist")]
    UnknownMessage(MessageHandle),
}

/// A button attached to an outgoing message.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct ButtonSpec {
    pub label: String,
    pub data: String,
}

impl ButtonSpec {
    pub fn new(label: &str, button: Button) -> Self {
        Self {
            label: label.to_string(),
            data: button.data(),
        }
    }
}

/// An outgoing message: some text and an optional grid of buttons.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug, Default)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<Vec<ButtonSpec>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: vec![],
        }
    }

    /// Adds a row of buttons.
    pub fn row(mut self, row: Vec<ButtonSpec>) -> Self {
        self.buttons.push(row);
        self
    }

    /// Lays the buttons out left to right, `width` to a row.
    pub fn grid(mut self, buttons: Vec<ButtonSpec>, width: usize) -> Self {
        let mut buttons = buttons.into_iter().peekable();
        while buttons.peek().is_some() {
            self.buttons.push(buttons.by_ref().take(width.max(1)).collect());
        }
        self
    }
}

/// The chat transport: delivers prompts to users and reports their events back.
pub trait Gateway: Send + Sync {
    /// Sends a new message to the user.
    fn send(&self, owner: OwnerId, reply: Reply) -> BoxFuture<'_, Result<MessageHandle, GatewayError>>;

    /// Replaces the text and buttons of a message sent earlier.
    fn edit(&self, message: MessageHandle, reply: Reply) -> BoxFuture<'_, Result<(), GatewayError>>;

    /// Removes a message from the conversation.
    fn delete(&self, message: MessageHandle) -> BoxFuture<'_, Result<(), GatewayError>>;

    /// The registry of pending waits that inbound events are offered to first.
    fn matcher(&self) -> &Matcher;

    /// Waits for the next event accepted by `filter`, giving up after `timeout`.
    fn await_event(&self, filter: EventFilter, timeout: Duration) -> BoxFuture<'_, Result<Event, GameError>> {
        let listener = self.matcher().listen(filter);
        Box::pin(listener.recv(timeout))
    }
}

type Predicate = Box<dyn Fn(&Event) -> bool + Send + Sync>;

/// Decides which inbound event a pending wait is interested in.
pub struct EventFilter {
    owner: OwnerId,
    predicate: Predicate,
}

impl EventFilter {
    /// Accepts events from `owner` for which `predicate` holds.
    pub fn new(owner: OwnerId, predicate: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        Self {
            owner,
            predicate: Box::new(predicate),
        }
    }

    /// Accepts plain text from `owner`; commands don't count.
    pub fn text(owner: OwnerId) -> Self {
        Self::new(owner, |event| matches!(event.kind, EventKind::Text(_)))
    }

    /// Accepts clicks from `owner` on any of the given buttons.
    pub fn buttons(owner: OwnerId, accepted: &[Button]) -> Self {
        let accepted = accepted.to_vec();
        Self::new(owner, move |event| {
            event.as_button().is_some_and(|button| accepted.contains(&button))
        })
    }

    /// Accepts clicks from `owner` on `button` carried by `message`.
    /// Clicks that don't say which message they came from are accepted too.
    pub fn click_on(owner: OwnerId, button: Button, message: Option<MessageHandle>) -> Self {
        Self::new(owner, move |event| {
            event.as_button() == Some(button)
                && (message.is_none() || event.message.is_none() || event.message == message)
        })
    }

    pub fn matches(&self, event: &Event) -> bool {
        event.sender == self.owner && (self.predicate)(event)
    }
}

struct Waiter {
    id: u64,
    filter: EventFilter,
    sender: oneshot::Sender<Event>,
}

/// Pairs inbound events with the conversations suspended waiting for them.
#[derive(Default)]
pub struct Matcher {
    waiters: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

/// A registered wait. Registering before the prompt goes out means a fast
/// answer can't slip past; dropping the listener withdraws the wait.
pub struct Listener<'a> {
    matcher: &'a Matcher,
    id: u64,
    receiver: oneshot::Receiver<Event>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in the next event accepted by `filter`.
    pub fn listen(&self, filter: EventFilter) -> Listener<'_> {
        let (sender, receiver) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Waiter { id, filter, sender });
        Listener {
            matcher: self,
            id,
            receiver,
        }
    }

    /// Hands `event` to the oldest waiter that wants it. Returns the event if nobody did.
    pub fn dispatch(&self, event: Event) -> Option<Event> {
        let mut waiters = self.lock();
        waiters.retain(|w| !w.sender.is_closed());
        let Some(idx) = waiters.iter().position(|w| w.filter.matches(&event)) else {
            return Some(event);
        };
        let waiter = waiters.remove(idx);
        waiter.sender.send(event).err()
    }

    /// Number of waits currently pending.
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|w| !w.sender.is_closed()).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Listener<'_> {
    /// Suspends until a matching event arrives, or fails with [GameError::Timeout].
    pub async fn recv(mut self, timeout: Duration) -> Result<Event, GameError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(event)) => Ok(event),
            _ => {
                // An event may have been handed over just as the timer fired
                self.receiver.close();
                self.receiver.try_recv().map_err(|_| GameError::Timeout)
            }
        }
    }
}

impl Drop for Listener<'_> {
    fn drop(&mut self) {
        self.matcher.lock().retain(|w| w.id != self.id);
    }
}
