//! Paging over a list of photos: loads a window around the visible page and
//! gives memory back for pages that scroll out of it.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::config::LoaderConfig;
use crate::coordinator::PhotoLoadCoordinator;
use crate::delegate::{LoadEvent, LoadQueue};
use crate::photo::Photo;
use crate::transport::Transport;
use crate::{Error, Result};

/// How many neighbouring pages to load alongside the visible one.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchBehavior {
    /// Only the visible page.
    Conservative,
    /// The visible page and one on each side.
    #[default]
    Regular,
    /// The visible page and two on each side.
    Aggressive,
}

impl PrefetchBehavior {
    pub fn count(self) -> usize {
        match self {
            PrefetchBehavior::Conservative => 0,
            PrefetchBehavior::Regular => 2,
            PrefetchBehavior::Aggressive => 4,
        }
    }
}

pub struct PhotosDataSource {
    photos: Vec<Photo>,
    initial_index: usize,
    prefetch: PrefetchBehavior,
}

impl PhotosDataSource {
    pub fn new(photos: Vec<Photo>, initial_index: usize, prefetch: PrefetchBehavior) -> Result<Self> {
        if !photos.is_empty() && initial_index >= photos.len() {
            return Err(Error::InvalidInitialIndex {
                index: initial_index,
                len: photos.len(),
            });
        }

        let initial_index = if photos.is_empty() { 0 } else { initial_index };
        Ok(Self {
            photos,
            initial_index,
            prefetch,
        })
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn initial_index(&self) -> usize {
        self.initial_index
    }

    pub fn prefetch(&self) -> PrefetchBehavior {
        self.prefetch
    }

    pub fn photo(&self, index: usize) -> Option<&Photo> {
        self.photos.get(index)
    }

    pub fn photo_mut(&mut self, index: usize) -> Option<&mut Photo> {
        self.photos.get_mut(index)
    }

    /// Pages to load when `index` is visible.
    pub fn load_window(&self, index: usize) -> Range<usize> {
        let count = self.prefetch.count();
        let start = index.saturating_sub(count / 2);
        let end = (start + count + 1).min(self.photos.len());
        start..end.max(start)
    }

    /// The pages just outside the load window, whose memory can be reclaimed.
    pub fn reduce_window(&self, index: usize) -> Vec<usize> {
        let reach = self.prefetch.count() / 2 + 1;
        let lower = index.checked_sub(reach);
        let upper = Some(index + reach).filter(|&i| i < self.photos.len());
        lower.into_iter().chain(upper).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoLoadingState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    LoadingCancelled,
    LoadingFailed,
}

#[derive(Debug, Default)]
pub struct PhotoStatus {
    pub state: PhotoLoadingState,
    pub progress: f32,
    pub error: Option<Error>,
    /// Generation of the latest request issued for this page. Queued events
    /// from any other generation are dropped.
    pub generation: u64,
}

/// Drives a [`PhotoLoadCoordinator`] for a paged list of photos.
///
/// Load outcomes are queued and applied to the photos when the owner calls
/// [`PhotoPager::process_events`] on its display thread.
pub struct PhotoPager {
    data_source: PhotosDataSource,
    statuses: Vec<PhotoStatus>,
    coordinator: PhotoLoadCoordinator<usize>,
    events: LoadQueue<usize>,
    current: usize,
}

impl PhotoPager {
    pub fn new(
        data_source: PhotosDataSource,
        transport: impl Transport,
        config: &LoaderConfig,
        runtime: Handle,
    ) -> Result<Self> {
        let events = LoadQueue::new();
        let coordinator = PhotoLoadCoordinator::new(transport, events.clone(), config, runtime)?;
        let statuses = (0..data_source.len()).map(|_| PhotoStatus::default()).collect();
        let current = data_source.initial_index();

        Ok(Self {
            data_source,
            statuses,
            coordinator,
            events,
            current,
        })
    }

    pub fn coordinator(&self) -> &PhotoLoadCoordinator<usize> {
        &self.coordinator
    }

    pub fn data_source(&self) -> &PhotosDataSource {
        &self.data_source
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn photo(&self, index: usize) -> Option<&Photo> {
        self.data_source.photo(index)
    }

    pub fn status(&self, index: usize) -> Option<&PhotoStatus> {
        self.statuses.get(index)
    }

    /// Events waiting for [`PhotoPager::process_events`].
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Make `index` the visible page.
    #[profiling::function]
    pub fn show(&mut self, index: usize) {
        if index >= self.data_source.len() {
            tracing::warn!(
                "ignoring page {index}, only {} photos",
                self.data_source.len()
            );
            return;
        }

        self.current = index;
        self.load_photos(index);
        self.reduce_memory(index);
    }

    fn load_photos(&mut self, index: usize) {
        for i in self.data_source.load_window(index) {
            let status = &mut self.statuses[i];
            if !matches!(
                status.state,
                PhotoLoadingState::NotLoaded | PhotoLoadingState::LoadingCancelled
            ) {
                continue;
            }

            status.state = PhotoLoadingState::Loading;
            status.progress = 0.0;
            self.request(i);
        }
    }

    fn request(&mut self, index: usize) {
        if let Some(photo) = self.data_source.photo(index) {
            self.coordinator.request(photo, index);
        }
        self.statuses[index].generation = self.coordinator.generation(&index);
    }

    fn reduce_memory(&mut self, index: usize) {
        for i in self.data_source.reduce_window(index) {
            let status = &mut self.statuses[i];
            match status.state {
                PhotoLoadingState::Loading => {
                    self.coordinator.cancel(&i);
                    status.state = PhotoLoadingState::LoadingCancelled;
                }
                PhotoLoadingState::Loaded => {
                    let cleared = self
                        .data_source
                        .photo_mut(i)
                        .is_some_and(Photo::clear_cached_content);
                    if cleared {
                        tracing::trace!("released cached content for page {i}");
                        status.state = PhotoLoadingState::NotLoaded;
                        status.progress = 0.0;
                    }
                }
                _ => {}
            }
        }
    }

    /// Load a page again after a failure. Returns false if the page is
    /// already loading or loaded.
    pub fn retry(&mut self, index: usize) -> bool {
        let Some(status) = self.statuses.get_mut(index) else {
            return false;
        };

        if matches!(
            status.state,
            PhotoLoadingState::Loading | PhotoLoadingState::Loaded
        ) {
            return false;
        }

        status.error = None;
        status.state = PhotoLoadingState::Loading;
        status.progress = 0.0;
        self.request(index);
        true
    }

    /// Apply queued load events. Returns the pages that changed, in order.
    #[profiling::function]
    pub fn process_events(&mut self) -> Vec<usize> {
        let mut changed: Vec<usize> = vec![];

        while let Some(event) = self.events.pop() {
            let index = *event.key();
            let Some(status) = self.statuses.get_mut(index) else {
                continue;
            };

            if event.generation() != status.generation {
                tracing::trace!(
                    "dropping event for page {index} from generation {}, live is {}",
                    event.generation(),
                    status.generation
                );
                continue;
            }

            let applied = match event {
                LoadEvent::Progress { fraction, .. } => {
                    if status.state == PhotoLoadingState::Loading {
                        status.progress = fraction;
                        true
                    } else {
                        false
                    }
                }
                LoadEvent::Success { content, .. } => {
                    if status.state == PhotoLoadingState::Loading {
                        if let Some(photo) = self.data_source.photo_mut(index) {
                            photo.cache_content(content);
                        }
                        status.state = PhotoLoadingState::Loaded;
                        status.progress = 1.0;
                        true
                    } else {
                        false
                    }
                }
                LoadEvent::Failure { error, .. } => {
                    if status.state == PhotoLoadingState::LoadingCancelled {
                        false
                    } else {
                        tracing::info!("page {index} failed to load: {error}");
                        status.state = PhotoLoadingState::LoadingFailed;
                        status.error = Some(error);
                        true
                    }
                }
            };

            if applied && !changed.contains(&index) {
                changed.push(index);
            }
        }

        changed
    }

    /// Cancel every in-flight load, e.g. when the viewer goes away.
    pub fn cancel_all(&mut self) {
        self.coordinator.cancel_all();
        for status in &mut self.statuses {
            if status.state == PhotoLoadingState::Loading {
                status.state = PhotoLoadingState::LoadingCancelled;
            }
        }
    }
}
