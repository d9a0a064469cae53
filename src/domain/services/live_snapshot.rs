#[cfg(test)]
#[path = "live_snapshot_test.rs"]
mod tests;

use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use anyhow::Context as _;
use anyhow::Result;
use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::domain::models::DocumentRef;
use crate::domain::models::DocumentSnapshot;
use crate::domain::models::ListenerRegistration;
use crate::domain::models::Query;
use crate::domain::models::QuerySnapshot;
use crate::domain::models::RemoteStoreBox;
use crate::domain::models::SnapshotCallback;

pub type Sink<V> = Arc<dyn Fn(Result<V>) + Send + Sync>;
type AttachFn<V> = Arc<dyn Fn(Sink<V>) -> Result<ListenerRegistration> + Send + Sync>;

/// Turns a store's push-based snapshot listener into a typed sequence.
///
/// A `LiveSnapshot` is cold: every `attach` (or `stream`) opens its own remote
/// listener. Sharing one listener between many consumers is the job of
/// `Projection`. The first error ends the sequence and nothing is retried.
pub struct LiveSnapshot<V> {
    identity: String,
    attach: AttachFn<V>,
}

impl<V> Clone for LiveSnapshot<V> {
    fn clone(&self) -> LiveSnapshot<V> {
        return LiveSnapshot {
            identity: self.identity.to_string(),
            attach: self.attach.clone(),
        };
    }
}

fn decode_document<T: DeserializeOwned>(snapshot: DocumentSnapshot) -> Result<Option<T>> {
    match snapshot.data {
        Some(data) => {
            let value = serde_json::from_value::<T>(data)
                .with_context(|| return format!("Failed to decode document {}", snapshot.id))?;
            return Ok(Some(value));
        }
        None => return Ok(None),
    }
}

fn decode_query<T: DeserializeOwned>(snapshot: QuerySnapshot) -> Result<Vec<T>> {
    return snapshot
        .docs
        .into_iter()
        .filter_map(|doc| {
            return decode_document::<T>(doc).transpose();
        })
        .collect::<Result<Vec<T>>>();
}

impl<T: DeserializeOwned + 'static> LiveSnapshot<Option<T>> {
    /// Emits the document's value on every change, or `None` while it does
    /// not exist.
    pub fn document(store: RemoteStoreBox, reference: DocumentRef) -> LiveSnapshot<Option<T>> {
        let identity = reference.to_string();
        let attach: AttachFn<Option<T>> = Arc::new(move |sink: Sink<Option<T>>| {
            let callback: SnapshotCallback<DocumentSnapshot> =
                Arc::new(move |res: Result<DocumentSnapshot>| {
                    sink(res.and_then(decode_document::<T>));
                });

            return store.on_document_snapshot(&reference, callback);
        });

        return LiveSnapshot { identity, attach };
    }
}

impl<T: DeserializeOwned + 'static> LiveSnapshot<Vec<T>> {
    /// Emits every matching document, in query order, on every change.
    pub fn collection(store: RemoteStoreBox, query: Query) -> LiveSnapshot<Vec<T>> {
        let identity = query.to_string();
        let attach: AttachFn<Vec<T>> = Arc::new(move |sink: Sink<Vec<T>>| {
            let callback: SnapshotCallback<QuerySnapshot> =
                Arc::new(move |res: Result<QuerySnapshot>| {
                    sink(res.and_then(decode_query::<T>));
                });

            return store.on_query_snapshot(&query, callback);
        });

        return LiveSnapshot { identity, attach };
    }
}

impl<V: Send + 'static> LiveSnapshot<V> {
    pub fn identity(&self) -> &str {
        return &self.identity;
    }

    /// Opens a remote listener. `sink` receives every value, and at most one
    /// error after which it is never called again.
    pub fn attach<F>(&self, sink: F) -> Result<ListenerRegistration>
    where
        F: Fn(Result<V>) + Send + Sync + 'static,
    {
        let failed = Arc::new(AtomicBool::new(false));
        let guarded: Sink<V> = Arc::new(move |res: Result<V>| {
            if failed.load(Ordering::SeqCst) {
                return;
            }
            if res.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
            sink(res);
        });

        tracing::debug!(source = %self.identity, "Attaching live snapshot");
        return (self.attach)(guarded);
    }

    /// Opens a remote listener and exposes it as a `Stream`. Dropping the
    /// stream detaches the listener.
    pub fn stream(&self) -> LiveStream<V> {
        let (tx, rx) = mpsc::unbounded_channel::<Result<V>>();
        let sink_tx = tx.clone();
        let registration = match self.attach(move |res: Result<V>| {
            let _ = sink_tx.send(res);
        }) {
            Ok(registration) => Some(registration),
            Err(err) => {
                let _ = tx.send(Err(err));
                None
            }
        };

        return LiveStream {
            rx,
            registration,
            done: false,
        };
    }
}

/// Cancellable stream over one remote listener.
pub struct LiveStream<V> {
    rx: mpsc::UnboundedReceiver<Result<V>>,
    registration: Option<ListenerRegistration>,
    done: bool,
}

impl<V> Unpin for LiveStream<V> {}

impl<V> LiveStream<V> {
    /// Detaches the remote listener. Values already received are still
    /// yielded.
    pub fn cancel(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.remove();
        }
    }
}

impl<V> Stream for LiveStream<V> {
    type Item = Result<V>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Err(err))) => {
                this.done = true;
                this.cancel();
                return Poll::Ready(Some(Err(err)));
            }
            Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(Ok(value))),
            Poll::Ready(None) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Poll::Pending => {
                if this.registration.is_none() {
                    this.done = true;
                    return Poll::Ready(None);
                }
                return Poll::Pending;
            }
        }
    }
}
