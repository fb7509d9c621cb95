//! Lifecycle-bound consumer views of cached values
//!
//! A [`Binding`] bridges a consuming element's mount/unmount lifecycle
//! to the cache: it surfaces a `(value, is_loading)` pair, requests the
//! value on a cold mount, and tolerates being torn down before the
//! fetch settles. Tearing a binding down clears its liveness flag and
//! nothing else; it never cancels the underlying fetch and never
//! disturbs other bindings attached to the same operation.

use crate::cache::ResourceCache;
use crate::fetch::Fetcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// What the consuming element renders
#[derive(Debug, Clone, PartialEq)]
pub struct View<T> {
    /// Cached, resolved, or fallback value
    pub value: T,

    /// True until the pending fetch settles
    pub is_loading: bool,
}

/// Lifecycle state of a binding
///
/// `Resolved` and `StaleDiscarded` are terminal. `StaleDiscarded` is
/// reached only when the fetch settles after the binding was torn
/// down; an unmounted binding whose fetch never settles stays
/// `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStatus {
    Loading,
    Resolved,
    StaleDiscarded,
}

/// Per-mount subscription to a cached value
///
/// A warm mount (value already cached) resolves immediately and never
/// updates again. A cold mount surfaces the fallback with
/// `is_loading = true`, issues a request, and publishes the settled
/// view — unless the binding was unmounted first, in which case the
/// resolution is discarded without touching any shared state.
pub struct Binding<T> {
    id: Uuid,
    key: String,
    alive: Arc<AtomicBool>,
    status: Arc<Mutex<BindingStatus>>,
    view_rx: watch::Receiver<View<T>>,
}

impl<T> Binding<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Mount a binding for `key`, with `fallback` shown while loading
    /// (and kept if the fetch fails)
    pub fn mount<F>(cache: &ResourceCache<T>, key: &str, fetcher: F, fallback: T) -> Self
    where
        F: Fetcher<T> + 'static,
    {
        let id = Uuid::new_v4();
        let alive = Arc::new(AtomicBool::new(true));

        if let Some(value) = cache.peek(key) {
            debug!(%id, key, "mounted on warm cache");
            let (_tx, view_rx) = watch::channel(View {
                value,
                is_loading: false,
            });
            return Self {
                id,
                key: key.to_string(),
                alive,
                status: Arc::new(Mutex::new(BindingStatus::Resolved)),
                view_rx,
            };
        }

        debug!(%id, key, "mounted cold, requesting fetch");
        let (tx, view_rx) = watch::channel(View {
            value: fallback.clone(),
            is_loading: true,
        });
        let status = Arc::new(Mutex::new(BindingStatus::Loading));

        let cache = cache.clone();
        let task_key = key.to_string();
        let task_alive = Arc::clone(&alive);
        let task_status = Arc::clone(&status);
        tokio::spawn(async move {
            let resolved = cache.request(&task_key, fetcher).await;

            if !task_alive.load(Ordering::Acquire) {
                // Owner torn down mid-flight; the result is dropped on
                // the floor without touching shared state.
                debug!(%id, key = %task_key, "discarding resolution for unmounted binding");
                set_status(&task_status, BindingStatus::StaleDiscarded);
                return;
            }

            match resolved {
                Ok(value) => {
                    let _ = tx.send(View {
                        value,
                        is_loading: false,
                    });
                }
                Err(err) => {
                    warn!(%id, key = %task_key, error = %err, "fetch failed, keeping fallback");
                    let _ = tx.send(View {
                        value: fallback,
                        is_loading: false,
                    });
                }
            }
            set_status(&task_status, BindingStatus::Resolved);
        });

        Self {
            id,
            key: key.to_string(),
            alive,
            status,
            view_rx,
        }
    }

    /// Current view snapshot
    pub fn view(&self) -> View<T> {
        self.view_rx.borrow().clone()
    }

    /// Watch channel for the element to re-render on updates
    ///
    /// Warm-mounted bindings never publish again; their channel reads
    /// as already settled.
    pub fn subscribe(&self) -> watch::Receiver<View<T>> {
        self.view_rx.clone()
    }

    /// Lifecycle state of this binding
    pub fn status(&self) -> BindingStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier used in log output
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The resource key this binding reads
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the owning element is still mounted
    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Tear the binding down
    ///
    /// Clears the liveness flag and nothing else; idempotent. The
    /// underlying fetch, the cache, and every other binding are
    /// unaffected.
    pub fn unmount(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(id = %self.id, key = %self.key, "binding unmounted");
        }
    }
}

impl<T> Drop for Binding<T> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

fn set_status(status: &Mutex<BindingStatus>, next: BindingStatus) {
    let mut status = status.lock().unwrap_or_else(PoisonError::into_inner);
    *status = next;
}
