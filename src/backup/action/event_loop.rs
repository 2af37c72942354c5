use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use derive_more::Display;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Identifies an action within one [`ActionList`](super::ActionList)
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct ActionId(u64);

impl ActionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Wakes the controlling flow when background work finishes.
pub trait EventLoop {
    /// Hands out the one-shot handle an action uses to report that it is done
    fn completer(&self, id: ActionId) -> Completer;

    /// Blocks until at least one action has reported completion and returns
    /// every completion received so far.
    fn wait(&mut self) -> Result<Vec<ActionId>>;
}

/// One-shot completion signal for a started action
///
/// Consuming `complete` means a handle can report at most once. It may be
/// moved to and fired from any thread.
pub struct Completer {
    id: ActionId,
    notify: Box<dyn FnOnce(ActionId) + Send>,
}

impl Completer {
    pub fn new<F: FnOnce(ActionId) + Send + 'static>(id: ActionId, notify: F) -> Self {
        Self {
            id,
            notify: Box::new(notify),
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn complete(self) {
        tracing::trace!("Action {} signalled completion", self.id);
        (self.notify)(self.id)
    }
}

impl std::fmt::Debug for Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer").field("id", &self.id).finish()
    }
}

/// [`EventLoop`] backed by an mpsc channel
pub struct ChannelEventLoop {
    tx: Sender<ActionId>,
    rx: Receiver<ActionId>,
}

impl Default for ChannelEventLoop {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }
}

impl ChannelEventLoop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLoop for ChannelEventLoop {
    fn completer(&self, id: ActionId) -> Completer {
        let tx = self.tx.clone();
        Completer::new(id, move |id| {
            if tx.send(id).is_err() {
                tracing::warn!("Action {id} completed after its event loop was dropped");
            }
        })
    }

    fn wait(&mut self) -> Result<Vec<ActionId>> {
        // The loop keeps its own sender, so recv only fails if that invariant breaks.
        let first = self.rx.recv().map_err(|e| {
            Error::from(std::io::Error::other(format!("Event loop disconnected: {e}")))
        })?;
        let mut ids = vec![first];
        ids.extend(self.rx.try_iter());
        Ok(ids)
    }
}
