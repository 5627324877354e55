//! Keyed photo loading with at most one live request per display slot.
//!
//! Every `request` bumps a per-key generation. Results are delivered only
//! if their generation is still the live one for the key, which is checked
//! under the same lock `request` and `cancel` take. A superseded or
//! cancelled fetch that still manages to complete is discarded silently.

mod registry;

use std::{
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::runtime::Handle;

use crate::config::LoaderConfig;
use crate::decode::{is_gif, ImageDecoder, ImageRsDecoder};
use crate::delegate::{LoadDelegate, LoadEvent};
use crate::jobs::JobPool;
use crate::photo::{Photo, PhotoContent, PhotoSource};
use crate::transport::{ProgressSink, Transport};
use crate::{Error, Result};

pub use registry::LoadState;
use registry::Registry;

struct Shared<K> {
    registry: Mutex<Registry<K>>,
    delegate: Box<dyn LoadDelegate<K>>,
}

impl<K> Shared<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    fn registry(&self) -> MutexGuard<'_, Registry<K>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver_progress(&self, key: &K, generation: u64, fraction: f32) {
        let mut registry = self.registry();
        if let Some(fraction) = registry.advance_progress(key, generation, fraction) {
            self.delegate.on_event(LoadEvent::Progress {
                key: key.clone(),
                generation,
                fraction,
            });
        }
    }

    fn deliver_terminal(&self, key: &K, generation: u64, outcome: Result<PhotoContent>) {
        let mut registry = self.registry();
        let state = if outcome.is_ok() {
            LoadState::Succeeded
        } else {
            LoadState::Failed
        };

        if !registry.finish(key, generation, state) {
            tracing::debug!("discarding stale result for {key:?} (generation {generation})");
            return;
        }

        tracing::trace!("delivering {state:?} for {key:?}");
        let key = key.clone();
        self.delegate.on_event(match outcome {
            Ok(content) => LoadEvent::Success {
                key,
                generation,
                content,
            },
            Err(error) => LoadEvent::Failure {
                key,
                generation,
                error,
            },
        });
    }
}

/// Turns fetched bytes into deliverable content.
#[derive(Clone)]
struct Pipeline {
    decoder: Arc<dyn ImageDecoder>,
    pool: Arc<JobPool>,
    decode_stills: bool,
}

impl Pipeline {
    async fn process(self, bytes: Vec<u8>) -> Result<PhotoContent> {
        if !self.decode_stills || is_gif(&bytes) {
            return Ok(PhotoContent::Bytes(bytes.into()));
        }

        let decoder = self.decoder;
        let image = self.pool.schedule(move || decoder.decode(&bytes)).await??;
        Ok(PhotoContent::Image(Arc::new(image)))
    }
}

/// Mediates between a display surface and a [`Transport`], tracking at
/// most one in-flight load per key.
///
/// Outcomes go to the [`LoadDelegate`] supplied at construction. Dropping
/// the coordinator cancels everything still in flight.
pub struct PhotoLoadCoordinator<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    shared: Arc<Shared<K>>,
    transport: Arc<dyn Transport>,
    pipeline: Pipeline,
    runtime: Handle,
}

impl<K> PhotoLoadCoordinator<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    /// Fetches are spawned on `runtime`; decoding runs on a worker pool
    /// sized by `config.worker_threads`.
    pub fn new(
        transport: impl Transport,
        delegate: impl LoadDelegate<K>,
        config: &LoaderConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        let pool = JobPool::new(config.worker_threads)?;

        Ok(Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                delegate: Box::new(delegate),
            }),
            transport: Arc::new(transport),
            pipeline: Pipeline {
                decoder: Arc::new(ImageRsDecoder),
                pool: Arc::new(pool),
                decode_stills: config.decode_stills,
            },
            runtime,
        })
    }

    pub fn with_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.pipeline.decoder = Arc::new(decoder);
        self
    }

    /// Load `photo` for the display slot `key`, superseding any earlier
    /// request for the same key.
    ///
    /// Content already on the photo is delivered before this returns, as is
    /// [`Error::NoContent`] for a photo with nothing to load. Otherwise the
    /// URL is fetched in the background. Never blocks.
    #[profiling::function]
    pub fn request(&self, photo: &Photo, key: K) {
        let (generation, url) = {
            let mut registry = self.shared.registry();
            let generation = registry.begin(&key);

            match photo.source() {
                Some(PhotoSource::Url(url)) => (generation, url.clone()),
                Some(PhotoSource::Bytes(bytes)) => {
                    registry.finish(&key, generation, LoadState::Succeeded);
                    self.shared.delegate.on_event(LoadEvent::Success {
                        key,
                        generation,
                        content: PhotoContent::Bytes(bytes.clone()),
                    });
                    return;
                }
                Some(PhotoSource::Image(image)) => {
                    registry.finish(&key, generation, LoadState::Succeeded);
                    self.shared.delegate.on_event(LoadEvent::Success {
                        key,
                        generation,
                        content: PhotoContent::Image(image.clone()),
                    });
                    return;
                }
                None => {
                    tracing::debug!("{key:?}: photo has no content");
                    registry.finish(&key, generation, LoadState::Failed);
                    self.shared.delegate.on_event(LoadEvent::Failure {
                        key,
                        generation,
                        error: Error::NoContent,
                    });
                    return;
                }
            }
        };

        // The transport may report progress while building the future, so
        // the registry must not be held here.
        let progress = {
            let shared = self.shared.clone();
            let key = key.clone();
            ProgressSink::new(move |fraction| shared.deliver_progress(&key, generation, fraction))
        };
        let fetch = self.transport.fetch(&url, progress);

        let mut registry = self.shared.registry();
        if !registry.is_current(&key, generation) {
            tracing::debug!("{key:?}: request cancelled before the fetch started");
            return;
        }

        tracing::trace!("spawning fetch for {key:?} (generation {generation}): {url}");
        let shared = self.shared.clone();
        let pipeline = self.pipeline.clone();
        let task_key = key.clone();
        let task = self.runtime.spawn(async move {
            let outcome = match fetch.await {
                Ok(bytes) => pipeline.process(bytes).await,
                Err(err) => {
                    tracing::debug!("fetch for {task_key:?} failed: {err}");
                    Err(Error::Transport(err))
                }
            };
            shared.deliver_terminal(&task_key, generation, outcome);
        });

        registry.set_abort(&key, generation, task.abort_handle());
    }

    /// Cancel the in-flight load for `key`. Nothing is delivered for it
    /// afterwards. Idempotent.
    pub fn cancel(&self, key: &K) {
        if self.shared.registry().cancel(key) {
            tracing::debug!("cancelled load for {key:?}");
        }
    }

    /// Cancel every in-flight load.
    pub fn cancel_all(&self) {
        let cancelled = self.shared.registry().cancel_all();
        if cancelled > 0 {
            tracing::debug!("cancelled {cancelled} in-flight loads");
        }
    }

    pub fn state(&self, key: &K) -> LoadState {
        self.shared.registry().state(key)
    }

    pub fn generation(&self, key: &K) -> u64 {
        self.shared.registry().generation(key)
    }

    pub fn progress(&self, key: &K) -> f32 {
        self.shared.registry().progress(key)
    }

    pub fn in_flight(&self) -> usize {
        self.shared.registry().in_flight()
    }
}

impl<K> Drop for PhotoLoadCoordinator<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cancel_all();
    }
}
