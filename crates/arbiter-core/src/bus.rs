//! The run-scoped event bus (§4.3).
//!
//! A thin wrapper over `tokio::sync::broadcast` is enough for a single
//! "everyone gets a copy" fan-out. This bus needs more: synchronous
//! subscribers (the writer)
//! must observe every event inline, in publish order, against a fixed
//! snapshot of the subscriber list; asynchronous subscribers run concurrently
//! but are tracked so a batch boundary can `flush` and learn about any
//! failures. Neither requirement fits `broadcast`, so the bus is built
//! directly on `Mutex` + `JoinSet`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use arbiter_types::events::{EngineEvent, Envelope};
use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

/// Identifies a subscription for later `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SyncHandlerFn = dyn Fn(&Envelope) + Send + Sync + 'static;
type AsyncHandlerFn = dyn Fn(Envelope) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>>
    + Send
    + Sync
    + 'static;

struct SyncSubscription {
    id: SubscriptionId,
    handler: std::sync::Arc<SyncHandlerFn>,
}

struct AsyncSubscription {
    id: SubscriptionId,
    handler: std::sync::Arc<AsyncHandlerFn>,
}

#[derive(Default)]
struct Subscribers {
    sync_subs: Vec<SyncSubscription>,
    async_subs: Vec<AsyncSubscription>,
}

/// A subscriber failure captured instead of propagated. `subscribe_safe`
/// semantics: one handler's panic or error never stops dispatch to the rest.
#[derive(Debug, Clone)]
pub struct HandlerWarning {
    pub subscription: SubscriptionId,
    pub message: String,
}

pub struct EventBus {
    sequence: AtomicU64,
    next_id: AtomicU64,
    subscribers: StdMutex<Subscribers>,
    pending: AsyncMutex<JoinSet<(SubscriptionId, Result<(), String>)>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            subscribers: StdMutex::new(Subscribers::default()),
            pending: AsyncMutex::new(JoinSet::new()),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a synchronous handler, invoked inline during `publish` in
    /// subscription order against the snapshot taken at publish time.
    pub fn subscribe_sync<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.subscribers.lock().unwrap().sync_subs.push(SyncSubscription {
            id,
            handler: std::sync::Arc::new(handler),
        });
        id
    }

    /// Registers an asynchronous handler. Each publish spawns its future on
    /// a tracked `JoinSet`; call `flush` to await completion and collect
    /// failures as warnings.
    pub fn subscribe_async<F, Fut>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let id = self.allocate_id();
        let boxed: std::sync::Arc<AsyncHandlerFn> =
            std::sync::Arc::new(move |envelope| Box::pin(handler(envelope)));
        self.subscribers
            .lock()
            .unwrap()
            .async_subs
            .push(AsyncSubscription { id, handler: boxed });
        id
    }

    /// Removes a subscription. Calling this twice with the same id, or with
    /// an id that was never registered, is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.sync_subs.retain(|s| s.id != id);
        subs.async_subs.retain(|s| s.id != id);
    }

    /// Stamps `event` with a monotonic sequence number and the current
    /// timestamp, dispatches it to every subscriber registered at the time
    /// of the call, and returns the stamped envelope plus any sync-handler
    /// failures. Async handlers are spawned, not awaited; call `flush` to
    /// observe their outcome.
    pub fn publish(&self, event: EngineEvent) -> (Envelope, Vec<HandlerWarning>) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            sequence,
            emitted_at: Utc::now(),
            event,
        };

        let (sync_snapshot, async_snapshot) = {
            let subs = self.subscribers.lock().unwrap();
            let sync_snapshot: Vec<_> = subs
                .sync_subs
                .iter()
                .map(|s| (s.id, s.handler.clone()))
                .collect();
            let async_snapshot: Vec<_> = subs
                .async_subs
                .iter()
                .map(|s| (s.id, s.handler.clone()))
                .collect();
            (sync_snapshot, async_snapshot)
        };

        let mut warnings = Vec::new();
        for (id, handler) in sync_snapshot {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&envelope)));
            if outcome.is_err() {
                warnings.push(HandlerWarning {
                    subscription: id,
                    message: "sync subscriber panicked".to_string(),
                });
            }
        }

        if !async_snapshot.is_empty() {
            // `try_lock` here would be wrong: publish is called from sync
            // contexts too, so block via `blocking_lock` is unavailable
            // without a runtime handle. Since no one else holds `pending`
            // across an await point, `blocking_lock` through `try_lock`
            // loop is unnecessary; a plain spawn via the current runtime
            // handle is enough because `publish` itself always runs inside
            // a tokio context in this engine.
            let mut pending = self
                .pending
                .try_lock()
                .expect("pending joinset is never held across an await point");
            for (id, handler) in async_snapshot {
                let fut = handler(envelope.clone());
                pending.spawn(async move { (id, fut.await) });
            }
        }

        (envelope, warnings)
    }

    /// Awaits every async handler spawned since the last `flush`, returning
    /// a warning for each one that returned an error.
    pub async fn flush(&self) -> Vec<HandlerWarning> {
        let mut pending = self.pending.lock().await;
        let mut warnings = Vec::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {}
                Ok((id, Err(message))) => warnings.push(HandlerWarning {
                    subscription: id,
                    message,
                }),
                Err(join_error) => warnings.push(HandlerWarning {
                    subscription: SubscriptionId(u64::MAX),
                    message: format!("async subscriber task failed: {join_error}"),
                }),
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::events::WarningRaisedPayload;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn sample_event() -> EngineEvent {
        EngineEvent::WarningRaised(WarningRaisedPayload {
            component: "test".to_string(),
            message: "hello".to_string(),
            trial_id: None,
            detail: None,
        })
    }

    #[test]
    fn publish_stamps_monotonic_sequence_numbers() {
        let bus = EventBus::new();
        let (first, _) = bus.publish(sample_event());
        let (second, _) = bus.publish(sample_event());
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
    }

    #[test]
    fn sync_subscribers_observe_every_publish_inline() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        bus.subscribe_sync(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(sample_event());
        bus.publish(sample_event());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let id = bus.subscribe_sync(|_| {});
        bus.unsubscribe(id);
        bus.unsubscribe(id);
    }

    #[test]
    fn panicking_subscriber_becomes_a_warning_not_an_abort() {
        let bus = EventBus::new();
        bus.subscribe_sync(|_| panic!("boom"));
        let called = Arc::new(AtomicUsize::new(0));
        let counted = called.clone();
        bus.subscribe_sync(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let (_, warnings) = bus.publish(sample_event());
        assert_eq!(warnings.len(), 1);
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_surfaces_async_subscriber_errors() {
        let bus = EventBus::new();
        bus.subscribe_async(|_| async { Err("failed".to_string()) });
        bus.publish(sample_event());
        let warnings = bus.flush().await;
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "failed");
    }

    #[tokio::test]
    async fn flush_with_no_async_subscribers_returns_empty() {
        let bus = EventBus::new();
        bus.publish(sample_event());
        let warnings = bus.flush().await;
        assert!(warnings.is_empty());
    }
}
