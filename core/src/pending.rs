//! Waiters for correlated completions
//!
//! A caller that wants to await a specific completion registers a waiter under
//! a `CorrelationKey` before the stack call is issued. When the router decodes
//! a completion carrying the same key it hands the event to the oldest live
//! waiter for that key instead of the actor channel. Waiters for one key are
//! served strictly in registration order.

use crate::codec::{DeviceAddress, Uuid128};
use crate::error::BridgeError;
use crate::events::{ActorKind, GattEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Identifiers that tie a completion back to the request that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    Registration { kind: ActorKind, app_uuid: Uuid128 },
    CharacteristicRead { conn_id: i32, handle: u16 },
    CharacteristicWrite { conn_id: i32, handle: u16 },
    DescriptorRead { conn_id: i32, handle: u16 },
    DescriptorWrite { conn_id: i32, handle: u16 },
    ServiceSearch { conn_id: i32 },
    ExecuteWrite { conn_id: i32 },
    Mtu { conn_id: i32 },
    GattDb { conn_id: i32 },
    RemoteRssi { client_if: i32, address: DeviceAddress },
}

type WaiterMap = HashMap<CorrelationKey, VecDeque<oneshot::Sender<GattEvent>>>;

/// Future resolving to the correlated completion event.
///
/// Dropping it before completion removes its slot from the table.
#[derive(Debug)]
pub struct Pending {
    key: CorrelationKey,
    rx: oneshot::Receiver<GattEvent>,
    table: Weak<Mutex<WaiterMap>>,
}

impl Pending {
    pub fn key(&self) -> CorrelationKey {
        self.key
    }
}

impl Future for Pending {
    type Output = Result<GattEvent, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| BridgeError::Cancelled))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        // Closing first marks our sender, so pruning removes exactly it
        self.rx.close();
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut waiters = table.lock();
        if let Some(queue) = waiters.get_mut(&self.key) {
            queue.retain(|sender| !sender.is_closed());
            if queue.is_empty() {
                waiters.remove(&self.key);
            }
        }
    }
}

/// Table of outstanding waiters
#[derive(Default)]
pub struct PendingTable {
    waiters: Arc<Mutex<WaiterMap>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `key`
    pub fn register(&self, key: CorrelationKey) -> Pending {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters.lock();
        let queue = waiters.entry(key).or_default();
        queue.retain(|sender| !sender.is_closed());
        queue.push_back(tx);
        Pending {
            key,
            rx,
            table: Arc::downgrade(&self.waiters),
        }
    }

    /// Hand `event` to the oldest live waiter for `key`.
    ///
    /// Gives the event back if nobody is waiting, so the caller can deliver
    /// it elsewhere.
    pub fn complete(&self, key: &CorrelationKey, event: GattEvent) -> Result<(), GattEvent> {
        let mut waiters = self.waiters.lock();
        let Some(queue) = waiters.get_mut(key) else {
            return Err(event);
        };

        let mut event = event;
        let result = loop {
            match queue.pop_front() {
                Some(sender) => match sender.send(event) {
                    Ok(()) => break Ok(()),
                    // Receiver dropped; try the next waiter
                    Err(returned) => event = returned,
                },
                None => break Err(event),
            }
        };

        if queue.is_empty() {
            waiters.remove(key);
        }
        result
    }

    /// Number of live waiters across all keys
    pub fn len(&self) -> usize {
        self.waiters
            .lock()
            .values()
            .map(|queue| queue.iter().filter(|s| !s.is_closed()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a queue, live or not
    pub fn key_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Drop every waiter; their futures resolve to `BridgeError::Cancelled`
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = self.waiters.lock().drain().collect();
        drained.iter().map(|(_, queue)| queue.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_event(conn_id: i32, handle: u16, value: u8) -> GattEvent {
        GattEvent::CharacteristicRead {
            conn_id,
            status: 0,
            handle,
            value: vec![value],
        }
    }

    #[tokio::test]
    async fn test_complete_resolves_waiter() {
        let table = PendingTable::new();
        let key = CorrelationKey::CharacteristicRead {
            conn_id: 1,
            handle: 0x10,
        };
        let pending = table.register(key);
        assert_eq!(table.len(), 1);

        table.complete(&key, read_event(1, 0x10, 7)).expect("waiter present");
        assert_eq!(pending.await.unwrap(), read_event(1, 0x10, 7));
        assert!(table.is_empty());
    }

    #[test]
    fn test_complete_without_waiter_returns_event() {
        let table = PendingTable::new();
        let key = CorrelationKey::Mtu { conn_id: 3 };
        let event = GattEvent::MtuConfigured {
            conn_id: 3,
            status: 0,
            mtu: 247,
        };
        assert_eq!(table.complete(&key, event.clone()), Err(event));
    }

    #[tokio::test]
    async fn test_same_key_fifo() {
        let table = PendingTable::new();
        let key = CorrelationKey::DescriptorRead {
            conn_id: 1,
            handle: 4,
        };
        let first = table.register(key);
        let second = table.register(key);

        table.complete(&key, read_event(1, 4, 1)).unwrap();
        table.complete(&key, read_event(1, 4, 2)).unwrap();

        assert_eq!(first.await.unwrap(), read_event(1, 4, 1));
        assert_eq!(second.await.unwrap(), read_event(1, 4, 2));
    }

    #[tokio::test]
    async fn test_dropped_waiter_skipped() {
        let table = PendingTable::new();
        let key = CorrelationKey::GattDb { conn_id: 9 };
        let abandoned = table.register(key);
        let live = table.register(key);
        drop(abandoned);

        let event = GattEvent::GattDbRetrieved {
            conn_id: 9,
            rows: vec![],
        };
        table.complete(&key, event.clone()).unwrap();
        assert_eq!(live.await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_clear_cancels() {
        let table = PendingTable::new();
        let pending = table.register(CorrelationKey::ServiceSearch { conn_id: 2 });
        assert_eq!(table.clear(), 1);
        assert_eq!(pending.await, Err(BridgeError::Cancelled));
    }

    #[test]
    fn test_dropped_waiters_release_their_keys() {
        let table = PendingTable::new();
        for handle in 0..1000u16 {
            let pending = table.register(CorrelationKey::CharacteristicRead {
                conn_id: 1,
                handle,
            });
            drop(pending);
        }
        assert!(table.is_empty());
        assert_eq!(table.key_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_one_waiter_keeps_the_rest() {
        let table = PendingTable::new();
        let key = CorrelationKey::Mtu { conn_id: 4 };
        let first = table.register(key);
        let second = table.register(key);
        drop(first);
        assert_eq!(table.len(), 1);
        assert_eq!(table.key_count(), 1);

        let event = GattEvent::MtuConfigured {
            conn_id: 4,
            status: 0,
            mtu: 185,
        };
        table.complete(&key, event.clone()).unwrap();
        assert_eq!(second.await.unwrap(), event);
        assert_eq!(table.key_count(), 0);
    }

    #[test]
    fn test_pending_outliving_table() {
        let table = PendingTable::new();
        let pending = table.register(CorrelationKey::ServiceSearch { conn_id: 1 });
        drop(table);
        drop(pending);
    }

    #[test]
    fn test_keys_distinguish_handles() {
        let a = CorrelationKey::CharacteristicRead {
            conn_id: 1,
            handle: 1,
        };
        let b = CorrelationKey::CharacteristicRead {
            conn_id: 1,
            handle: 2,
        };
        assert_ne!(a, b);
    }
}
