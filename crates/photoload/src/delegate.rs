use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::{Error, PhotoContent};

/// Receives the outcome of loads issued through a
/// [`PhotoLoadCoordinator`](crate::PhotoLoadCoordinator).
///
/// Callbacks arrive on whatever thread finished the work, and are made
/// while the coordinator's registry is locked. Implementations must hand
/// results off to their display thread and must not call back into the
/// coordinator from inside a callback. [`LoadQueue`] does this for you.
pub trait LoadDelegate<K>: Send + Sync + 'static {
    /// Entry point used by the coordinator. Dispatches to the callbacks
    /// below unless a delegate wants the whole event, generation included.
    fn on_event(&self, event: LoadEvent<K>) {
        match event {
            LoadEvent::Progress { key, fraction, .. } => self.on_progress(&key, fraction),
            LoadEvent::Success { key, content, .. } => self.on_success(&key, content),
            LoadEvent::Failure { key, error, .. } => self.on_failure(&key, error),
        }
    }

    /// Terminal: the load produced displayable content.
    fn on_success(&self, key: &K, content: PhotoContent);

    /// Terminal: the load failed. The consumer may issue the request again.
    fn on_failure(&self, key: &K, error: Error);

    /// Fraction in `0..=1`, never decreasing within one request.
    fn on_progress(&self, _key: &K, _fraction: f32) {}
}

impl<K, D> LoadDelegate<K> for Arc<D>
where
    D: LoadDelegate<K> + ?Sized,
{
    fn on_event(&self, event: LoadEvent<K>) {
        (**self).on_event(event)
    }

    fn on_success(&self, key: &K, content: PhotoContent) {
        (**self).on_success(key, content)
    }

    fn on_failure(&self, key: &K, error: Error) {
        (**self).on_failure(key, error)
    }

    fn on_progress(&self, key: &K, fraction: f32) {
        (**self).on_progress(key, fraction)
    }
}

/// One callback, tagged with the generation of the request it belongs to.
///
/// Generations start at 1. Events built outside a coordinator carry 0.
#[derive(Debug)]
pub enum LoadEvent<K> {
    Progress {
        key: K,
        generation: u64,
        fraction: f32,
    },
    Success {
        key: K,
        generation: u64,
        content: PhotoContent,
    },
    Failure {
        key: K,
        generation: u64,
        error: Error,
    },
}

impl<K> LoadEvent<K> {
    pub fn key(&self) -> &K {
        match self {
            LoadEvent::Progress { key, .. }
            | LoadEvent::Success { key, .. }
            | LoadEvent::Failure { key, .. } => key,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Progress { generation, .. }
            | LoadEvent::Success { generation, .. }
            | LoadEvent::Failure { generation, .. } => *generation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress { .. })
    }
}

/// Delegate that queues events for the consumer to drain on its own thread.
///
/// Clones share the same queue: give one to the coordinator, keep one.
pub struct LoadQueue<K> {
    events: Arc<SegQueue<LoadEvent<K>>>,
}

impl<K> Clone for LoadQueue<K> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<K> Default for LoadQueue<K> {
    fn default() -> Self {
        Self {
            events: Default::default(),
        }
    }
}

impl<K> LoadQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<LoadEvent<K>> {
        self.events.pop()
    }

    #[profiling::function]
    pub fn drain(&self, mut deliver: impl FnMut(LoadEvent<K>)) {
        while let Some(event) = self.events.pop() {
            deliver(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<K> LoadDelegate<K> for LoadQueue<K>
where
    K: Clone + Send + Sync + 'static,
{
    fn on_event(&self, event: LoadEvent<K>) {
        self.events.push(event);
    }

    fn on_success(&self, key: &K, content: PhotoContent) {
        self.events.push(LoadEvent::Success {
            key: key.clone(),
            generation: 0,
            content,
        });
    }

    fn on_failure(&self, key: &K, error: Error) {
        self.events.push(LoadEvent::Failure {
            key: key.clone(),
            generation: 0,
            error,
        });
    }

    fn on_progress(&self, key: &K, fraction: f32) {
        self.events.push(LoadEvent::Progress {
            key: key.clone(),
            generation: 0,
            fraction,
        });
    }
}

type SuccessFn<K> = Box<dyn Fn(&K, PhotoContent) + Send + Sync>;
type FailureFn<K> = Box<dyn Fn(&K, Error) + Send + Sync>;
type ProgressFn<K> = Box<dyn Fn(&K, f32) + Send + Sync>;

/// Delegate assembled from independently set closures. Unset callbacks do nothing.
///
/// The closures run with the coordinator's registry locked. Calling
/// `request` or `cancel` from one of them deadlocks; push the work to
/// another thread or use a [`LoadQueue`] instead.
pub struct FnDelegate<K> {
    success: Option<SuccessFn<K>>,
    failure: Option<FailureFn<K>>,
    progress: Option<ProgressFn<K>>,
}

impl<K> Default for FnDelegate<K> {
    fn default() -> Self {
        Self {
            success: None,
            failure: None,
            progress: None,
        }
    }
}

impl<K> FnDelegate<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_success(mut self, f: impl Fn(&K, PhotoContent) + Send + Sync + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    pub fn with_failure(mut self, f: impl Fn(&K, Error) + Send + Sync + 'static) -> Self {
        self.failure = Some(Box::new(f));
        self
    }

    pub fn with_progress(mut self, f: impl Fn(&K, f32) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }
}

impl<K: 'static> LoadDelegate<K> for FnDelegate<K> {
    fn on_success(&self, key: &K, content: PhotoContent) {
        if let Some(f) = &self.success {
            f(key, content);
        }
    }

    fn on_failure(&self, key: &K, error: Error) {
        if let Some(f) = &self.failure {
            f(key, error);
        }
    }

    fn on_progress(&self, key: &K, fraction: f32) {
        if let Some(f) = &self.progress {
            f(key, fraction);
        }
    }
}
