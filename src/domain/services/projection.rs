#[cfg(test)]
#[path = "projection_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use anyhow::Result;
use tokio::sync::mpsc;

use super::live_snapshot::LiveSnapshot;
use super::observable::lock;
use crate::domain::models::ListenerRegistration;

#[derive(Clone, Debug, PartialEq)]
pub enum Emission<V> {
    /// A new value. `None` is the null emitted for a start value or a
    /// contained fault.
    Next(Option<V>),
    /// The branch is finished and nothing else will be delivered.
    Complete,
}

pub type Observer<V> = Arc<dyn Fn(Emission<V>) + Send + Sync>;

struct Delivery<V> {
    observers: Vec<Observer<V>>,
    emission: Emission<V>,
}

struct ProjectionState<V> {
    /// Bumped whenever the shared attachment is torn down so callbacks and
    /// subscriptions from an older attachment are ignored.
    epoch: u64,
    observers: BTreeMap<u64, Observer<V>>,
    next_observer_id: u64,
    latest: Option<V>,
    registration: Option<ListenerRegistration>,
    attaching: bool,
    /// Emissions waiting to be handed to observers, in the order they were
    /// produced. Only the caller that set `draining` hands them out.
    queue: VecDeque<Delivery<V>>,
    draining: bool,
}

impl<V> ProjectionState<V> {
    fn enqueue(&mut self, observers: Vec<Observer<V>>, emissions: Vec<Emission<V>>) {
        for emission in emissions {
            self.queue.push_back(Delivery {
                observers: observers.clone(),
                emission,
            });
        }
    }
}

/// Shared, deduplicated, replaying view over a `LiveSnapshot`.
///
/// The first subscriber attaches the remote listener and the last one to
/// leave detaches it. Values equal to the previous value are skipped, the
/// latest value is replayed to late subscribers, and a remote failure is
/// turned into one `None` followed by completion.
pub struct Projection<V> {
    source: LiveSnapshot<V>,
    initial: Option<Option<V>>,
    state: Arc<Mutex<ProjectionState<V>>>,
}

impl<V: Clone> Clone for Projection<V> {
    fn clone(&self) -> Projection<V> {
        return Projection {
            source: self.source.clone(),
            initial: self.initial.clone(),
            state: self.state.clone(),
        };
    }
}

/// Hands out queued emissions outside the lock. Emissions produced while a
/// drain is running, whether from an observer or another thread, are queued
/// behind it and handed out by the same drain.
fn drain<V: Clone>(state: &Mutex<ProjectionState<V>>) {
    {
        let mut state = lock(state);
        if state.draining {
            return;
        }
        state.draining = true;
    }

    loop {
        let next = {
            let mut state = lock(state);
            let next = state.queue.pop_front();
            if next.is_none() {
                state.draining = false;
            }
            next
        };

        let Some(delivery) = next else {
            return;
        };
        for observer in &delivery.observers {
            observer(delivery.emission.clone());
        }
    }
}

impl<V> Projection<V>
where
    V: Clone + PartialEq + Send + 'static,
{
    pub fn new(source: LiveSnapshot<V>) -> Projection<V> {
        return Projection {
            source,
            initial: None,
            state: Arc::new(Mutex::new(ProjectionState {
                epoch: 0,
                observers: BTreeMap::new(),
                next_observer_id: 0,
                latest: None,
                registration: None,
                attaching: false,
                queue: VecDeque::new(),
                draining: false,
            })),
        };
    }

    /// Every subscriber first receives `value` before anything else, so
    /// renderers never have to tell "not loaded yet" apart from "failed".
    pub fn start_with(mut self, value: Option<V>) -> Projection<V> {
        self.initial = Some(value);
        return self;
    }

    pub fn identity(&self) -> &str {
        return self.source.identity();
    }

    /// The last value delivered by the shared attachment, if any.
    pub fn latest(&self) -> Option<V> {
        return lock(&self.state).latest.clone();
    }

    pub fn observer_count(&self) -> usize {
        return lock(&self.state).observers.len();
    }

    pub fn is_attached(&self) -> bool {
        return lock(&self.state).registration.is_some();
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Emission<V>) + Send + Sync + 'static,
    {
        let observer: Observer<V> = Arc::new(observer);
        let (id, epoch, should_attach) = {
            let mut state = lock(&self.state);
            let id = state.next_observer_id;
            state.next_observer_id += 1;
            state.observers.insert(id, observer.clone());

            let mut pending = vec![];
            if let Some(initial) = &self.initial {
                pending.push(Emission::Next(initial.clone()));
            }
            if let Some(latest) = &state.latest {
                pending.push(Emission::Next(Some(latest.clone())));
            }

            state.enqueue(vec![observer], pending);

            let should_attach = state.registration.is_none() && !state.attaching;
            if should_attach {
                state.attaching = true;
            }

            (id, state.epoch, should_attach)
        };

        drain(&self.state);

        if should_attach {
            self.connect(epoch);
        }

        let weak = Arc::downgrade(&self.state);
        let identity = self.identity().to_string();
        return Subscription::new(move || {
            Projection::release(&weak, &identity, id, epoch);
        });
    }

    /// Subscribes through a channel instead of a callback.
    pub fn watch(&self) -> Watch<V> {
        let (tx, rx) = mpsc::unbounded_channel::<Option<V>>();
        let tx = Mutex::new(Some(tx));
        let subscription = self.subscribe(move |emission| match emission {
            Emission::Next(value) => {
                if let Some(tx) = lock(&tx).as_ref() {
                    let _ = tx.send(value);
                }
            }
            Emission::Complete => {
                lock(&tx).take();
            }
        });

        return Watch {
            rx,
            _subscription: subscription,
        };
    }

    /// Waits for the first emission. `None` when the branch completes first.
    pub async fn first(&self) -> Option<Option<V>> {
        let mut watch = self.watch();
        return watch.recv().await;
    }

    fn connect(&self, epoch: u64) {
        let weak = Arc::downgrade(&self.state);
        let identity = self.identity().to_string();
        let sink_identity = identity.to_string();
        let res = self.source.attach(move |res: Result<V>| {
            if let Some(state) = weak.upgrade() {
                Projection::handle(&state, &sink_identity, epoch, res);
            }
        });

        match res {
            Ok(registration) => {
                let stale = {
                    let mut state = lock(&self.state);
                    if state.epoch == epoch && state.attaching {
                        state.attaching = false;
                        state.registration = Some(registration);
                        None
                    } else {
                        Some(registration)
                    }
                };

                // Lost the race against a fault or the last unsubscribe.
                drop(stale);
            }
            Err(err) => {
                Projection::handle(&self.state, &identity, epoch, Err(err));
            }
        }
    }

    fn handle(state: &Mutex<ProjectionState<V>>, identity: &str, epoch: u64, res: Result<V>) {
        let registration = {
            let mut state = lock(state);
            if state.epoch != epoch {
                return;
            }

            match res {
                Ok(value) => {
                    if state.latest.as_ref() == Some(&value) {
                        tracing::trace!(source = identity, "Skipping unchanged snapshot");
                        return;
                    }
                    state.latest = Some(value.clone());
                    let observers = state.observers.values().cloned().collect::<Vec<_>>();
                    state.enqueue(observers, vec![Emission::Next(Some(value))]);
                    None
                }
                Err(err) => {
                    tracing::warn!(
                        source = identity,
                        err = ?err,
                        "Live snapshot failed, emitting null"
                    );
                    let observers = std::mem::take(&mut state.observers)
                        .into_values()
                        .collect::<Vec<_>>();
                    state.latest = None;
                    state.attaching = false;
                    state.epoch += 1;
                    state.enqueue(observers, vec![Emission::Next(None), Emission::Complete]);
                    state.registration.take()
                }
            }
        };

        drain(state);
        drop(registration);
    }

    fn release(weak: &Weak<Mutex<ProjectionState<V>>>, identity: &str, id: u64, epoch: u64) {
        let Some(state) = weak.upgrade() else {
            return;
        };

        let registration = {
            let mut state = lock(&state);
            if state.epoch != epoch || state.observers.remove(&id).is_none() {
                return;
            }
            if !state.observers.is_empty() {
                return;
            }

            tracing::debug!(source = identity, "Last subscriber left, detaching");
            state.latest = None;
            state.attaching = false;
            state.epoch += 1;
            state.registration.take()
        };

        drop(registration);
    }
}

/// Keeps an observer attached to a projection until dropped or
/// `unsubscribe`d.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F: FnOnce() + Send + Sync + 'static>(release: F) -> Subscription {
        return Subscription {
            release: Some(Box::new(release)),
        };
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// Channel-backed subscription. `recv` yields `None` once the branch has
/// completed.
pub struct Watch<V> {
    rx: mpsc::UnboundedReceiver<Option<V>>,
    _subscription: Subscription,
}

impl<V> Watch<V> {
    pub async fn recv(&mut self) -> Option<Option<V>> {
        return self.rx.recv().await;
    }

    pub fn try_recv(&mut self) -> Option<Option<V>> {
        return self.rx.try_recv().ok();
    }
}
