use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::delivery::{read, write};
use crate::error::{DispatchError, Result};
use crate::traits::Dispatcher;

/// Per-connection map from dispatch byte to dispatcher.
///
/// Frames whose byte has no explicit entry go to the default dispatcher, if
/// one is set. Installing one catch-all this way routes all 256 dispatch
/// bytes into a single consumer.
#[derive(Default)]
pub struct DispatchTable {
    dispatchers: RwLock<HashMap<u8, Arc<dyn Dispatcher>>>,
    default: RwLock<Option<Arc<dyn Dispatcher>>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `dispatcher` under its own dispatch byte, returning the one it replaced.
    pub fn add(&self, dispatcher: Arc<dyn Dispatcher>) -> Option<Arc<dyn Dispatcher>> {
        write(&self.dispatchers).insert(dispatcher.dispatch(), dispatcher)
    }

    pub fn remove(&self, dispatch: u8) -> Option<Arc<dyn Dispatcher>> {
        write(&self.dispatchers).remove(&dispatch)
    }

    /// Install the dispatcher for bytes without an explicit entry.
    pub fn set_default(&self, dispatcher: Arc<dyn Dispatcher>) {
        *write(&self.default) = Some(dispatcher);
    }

    pub fn clear_default(&self) {
        *write(&self.default) = None;
    }

    /// The dispatcher that would handle `dispatch`.
    pub fn get(&self, dispatch: u8) -> Option<Arc<dyn Dispatcher>> {
        read(&self.dispatchers)
            .get(&dispatch)
            .cloned()
            .or_else(|| read(&self.default).clone())
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        read(&self.dispatchers).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.dispatchers).is_empty() && read(&self.default).is_none()
    }

    /// Hand `frame` to the dispatcher owning its first byte.
    ///
    /// No lock is held while the dispatcher runs, so registrations can change
    /// while a delivery is blocked on a slow consumer.
    pub fn route(&self, frame: &[u8]) -> Result<()> {
        let dispatch = *frame.first().ok_or(DispatchError::EmptyFrame)?;
        let dispatcher = self
            .get(dispatch)
            .ok_or(DispatchError::NoDispatcher(dispatch))?;
        dispatcher.receive(frame)
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bytes: Vec<u8> = read(&self.dispatchers).keys().copied().collect();
        bytes.sort_unstable();
        f.debug_struct("DispatchTable")
            .field("dispatchers", &bytes)
            .field("default", &read(&self.default).is_some())
            .finish()
    }
}
