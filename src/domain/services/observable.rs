#[cfg(test)]
#[path = "observable_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use anyhow::Context;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::models::KeyValueStoreBox;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    return mutex.lock().unwrap_or_else(PoisonError::into_inner);
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObservableState<T> {
    value: T,
    subscribers: BTreeMap<u64, Callback<T>>,
    next_id: u64,
}

/// Detaches a callback from an `Observable` when dropped.
pub struct Unsubscriber {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscriber {
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// A value plus change notification, handed to UI layers. Subscribers get
/// the current value straight away and again after every write. Consumers
/// receive references and clones, never the stored value itself.
pub struct Observable<T> {
    state: Arc<Mutex<ObservableState<T>>>,
    upstream: Option<Arc<Unsubscriber>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Observable<T> {
        return Observable {
            state: self.state.clone(),
            upstream: self.upstream.clone(),
        };
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Observable<T> {
        return Observable {
            state: Arc::new(Mutex::new(ObservableState {
                value,
                subscribers: BTreeMap::new(),
                next_id: 0,
            })),
            upstream: None,
        };
    }

    pub fn get(&self) -> T {
        return lock(&self.state).value.clone();
    }

    pub fn set(&self, value: T) {
        Observable::write(&self.state, |current| {
            *current = value;
            return true;
        });
    }

    /// Mutates the value in place and notifies subscribers.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        Observable::write(&self.state, |current| {
            f(current);
            return true;
        });
    }

    /// Like `update`, but subscribers are only notified when `f` reports a
    /// change. Returns what `f` reported.
    pub fn update_if<F: FnOnce(&mut T) -> bool>(&self, f: F) -> bool {
        let mut changed = false;
        Observable::write(&self.state, |current| {
            changed = f(current);
            return changed;
        });

        return changed;
    }

    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let (id, value) = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.insert(id, callback.clone());
            (id, state.value.clone())
        };

        callback(&value);

        let weak = Arc::downgrade(&self.state);
        return Unsubscriber {
            release: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    lock(&state).subscribers.remove(&id);
                }
            })),
        };
    }

    pub fn subscriber_count(&self) -> usize {
        return lock(&self.state).subscribers.len();
    }

    /// A read view computed from this one. Only changes of the computed
    /// value are propagated.
    pub fn derived<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + PartialEq + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let mut derived = Observable::new(f(&self.get()));
        let weak = Arc::downgrade(&derived.state);
        let unsubscriber = self.subscribe(move |value| {
            let Some(state) = weak.upgrade() else {
                return;
            };

            let next = f(value);
            Observable::write(&state, |current| {
                if *current == next {
                    return false;
                }
                *current = next;
                return true;
            });
        });

        derived.upstream = Some(Arc::new(unsubscriber));
        return derived;
    }

    /// Applies `f` under the lock, then notifies outside of it when `f`
    /// reports a change.
    fn write<F: FnOnce(&mut T) -> bool>(state: &Mutex<ObservableState<T>>, f: F) {
        let (subscribers, value) = {
            let mut state = lock(state);
            if !f(&mut state.value) {
                return;
            }
            let subscribers = state.subscribers.values().cloned().collect::<Vec<_>>();
            (subscribers, state.value.clone())
        };

        for subscriber in subscribers {
            subscriber(&value);
        }
    }
}

/// An `Observable` mirrored into a `KeyValueStore` key. The stored value is
/// loaded once on creation and rewritten on every mutation that changes it.
pub struct Persisted<T> {
    key: String,
    storage: KeyValueStoreBox,
    observable: Observable<T>,
}

impl<T> Clone for Persisted<T> {
    fn clone(&self) -> Persisted<T> {
        return Persisted {
            key: self.key.to_string(),
            storage: self.storage.clone(),
            observable: self.observable.clone(),
        };
    }
}

impl<T> Persisted<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn load(storage: KeyValueStoreBox, key: &str, default: T) -> Persisted<T> {
        let value = match storage.get(key) {
            Ok(Some(payload)) => match serde_json::from_str::<T>(&payload) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(key, err = ?err, "Discarding unreadable persisted value");
                    default
                }
            },
            Ok(None) => default,
            Err(err) => {
                tracing::warn!(key, err = ?err, "Failed to read persisted value");
                default
            }
        };

        return Persisted {
            key: key.to_string(),
            storage,
            observable: Observable::new(value),
        };
    }

    pub fn key(&self) -> &str {
        return &self.key;
    }

    pub fn get(&self) -> T {
        return self.observable.get();
    }

    pub fn observable(&self) -> &Observable<T> {
        return &self.observable;
    }

    pub fn subscribe<F>(&self, callback: F) -> Unsubscriber
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        return self.observable.subscribe(callback);
    }

    pub fn set(&self, value: T) -> Result<()> {
        return self.update(|current| {
            *current = value;
        });
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F) -> Result<()> {
        self.update_if(|current| {
            f(current);
            return true;
        })?;

        return Ok(());
    }

    /// Applies `f` to a copy of the value. When `f` reports a change the copy
    /// is stored first and only then becomes the observable value. A failed
    /// write notifies nobody. Returns whether anything changed.
    pub fn update_if<F: FnOnce(&mut T) -> bool>(&self, f: F) -> Result<bool> {
        let mut failure = None;
        let mut changed = false;
        Observable::write(&self.observable.state, |current| {
            let mut next = current.clone();
            if !f(&mut next) {
                return false;
            }

            if let Err(err) = self.store(&next) {
                failure = Some(err);
                return false;
            }

            *current = next;
            changed = true;
            return true;
        });

        if let Some(err) = failure {
            return Err(err);
        }

        return Ok(changed);
    }

    fn store(&self, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        return self
            .storage
            .set(&self.key, &payload)
            .with_context(|| return format!("Failed to persist {}", self.key));
    }
}
