//! Bounded-retry hand-off to consumer channels.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::trace;

/// How long a single send attempt waits before the consumer lookup is repeated.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of [`deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The consumer accepted the item.
    Delivered,
    /// No consumer was registered, or it was removed while retrying.
    NoConsumer,
    /// The consumer's receiving end was dropped.
    Closed,
}

/// Hand `item` to whichever sender `current` returns, retrying until accepted.
///
/// `current` is re-evaluated before every attempt, so clearing a registration
/// ends the loop within one [`RETRY_INTERVAL`]. There is no retry limit: a
/// consumer that stays registered but never drains blocks the caller forever.
pub fn deliver<T, F>(mut current: F, mut item: T) -> Delivery
where
    F: FnMut() -> Option<Sender<T>>,
{
    let mut attempts = 0u64;
    loop {
        let Some(tx) = current() else {
            return Delivery::NoConsumer;
        };
        match tx.send_timeout(item, RETRY_INTERVAL) {
            Ok(()) => return Delivery::Delivered,
            Err(SendTimeoutError::Timeout(returned)) => {
                attempts += 1;
                trace!(attempts, "consumer busy, retrying delivery");
                item = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return Delivery::Closed,
        }
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
