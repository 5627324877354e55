use std::{collections::HashMap, fmt::Debug, hash::Hash};

use tokio::task::AbortHandle;

/// Where a key is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
    Cancelled,
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Succeeded | LoadState::Failed)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    state: LoadState,
    progress: f32,
    abort: Option<AbortHandle>,
}

impl Slot {
    fn abort(&mut self) {
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
    }
}

/// key → (generation, state, progress, abort handle). Callers serialize
/// access behind a single lock.
#[derive(Debug)]
pub(crate) struct Registry<K> {
    slots: HashMap<K, Slot>,
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<K> Registry<K>
where
    K: Hash + Eq + Clone + Debug,
{
    /// Start a new request for `key`, superseding whatever came before.
    /// Returns the new generation.
    pub fn begin(&mut self, key: &K) -> u64 {
        let slot = self.slots.entry(key.clone()).or_default();
        if slot.state.is_loading() {
            tracing::debug!(
                "superseding in-flight load for {key:?} (generation {})",
                slot.generation
            );
        }
        slot.abort();
        slot.generation += 1;
        slot.state = LoadState::Loading;
        slot.progress = 0.0;
        slot.generation
    }

    /// Whether `generation` is still the live, unfinished request for `key`.
    pub fn is_current(&self, key: &K, generation: u64) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation && slot.state.is_loading())
    }

    /// Attach the cancellation handle for a running fetch. A handle for a
    /// request that is no longer current is aborted immediately.
    pub fn set_abort(&mut self, key: &K, generation: u64, handle: AbortHandle) {
        match self.slots.get_mut(key) {
            Some(slot) if slot.generation == generation && slot.state.is_loading() => {
                slot.abort = Some(handle);
            }
            _ => handle.abort(),
        }
    }

    /// Accept a progress report. Returns the value to deliver, or `None` if
    /// the request is stale or the value would go backwards.
    pub fn advance_progress(&mut self, key: &K, generation: u64, fraction: f32) -> Option<f32> {
        if fraction.is_nan() || !self.is_current(key, generation) {
            return None;
        }

        let slot = self.slots.get_mut(key)?;
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction < slot.progress {
            return None;
        }

        slot.progress = fraction;
        Some(fraction)
    }

    /// Record the terminal outcome of `generation`. Returns false when the
    /// request was superseded or cancelled and its result must be dropped.
    pub fn finish(&mut self, key: &K, generation: u64, state: LoadState) -> bool {
        debug_assert!(state.is_terminal());
        if !self.is_current(key, generation) {
            return false;
        }

        if let Some(slot) = self.slots.get_mut(key) {
            slot.state = state;
            slot.abort = None;
            if state == LoadState::Succeeded {
                slot.progress = 1.0;
            }
        }
        true
    }

    /// Cancel the in-flight request for `key`, if any.
    pub fn cancel(&mut self, key: &K) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };

        if !slot.state.is_loading() {
            return false;
        }

        slot.abort();
        slot.state = LoadState::Cancelled;
        true
    }

    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for slot in self.slots.values_mut() {
            if slot.state.is_loading() {
                slot.abort();
                slot.state = LoadState::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn state(&self, key: &K) -> LoadState {
        self.slots.get(key).map(|s| s.state).unwrap_or_default()
    }

    pub fn generation(&self, key: &K) -> u64 {
        self.slots.get(key).map(|s| s.generation).unwrap_or(0)
    }

    pub fn progress(&self, key: &K) -> f32 {
        self.slots.get(key).map(|s| s.progress).unwrap_or(0.0)
    }

    pub fn in_flight(&self) -> usize {
        self.slots.values().filter(|s| s.state.is_loading()).count()
    }
}
