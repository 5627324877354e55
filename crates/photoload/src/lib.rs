pub mod config;
mod coordinator;
pub mod decode;
mod delegate;
mod error;
pub mod jobs;
pub mod pager;
mod photo;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use config::LoaderConfig;
pub use coordinator::{LoadState, PhotoLoadCoordinator};
pub use decode::{DecodeError, ImageDecoder, ImageRsDecoder};
pub use delegate::{FnDelegate, LoadDelegate, LoadEvent, LoadQueue};
pub use error::Error;
pub use pager::{PhotoLoadingState, PhotoPager, PhotoStatus, PhotosDataSource, PrefetchBehavior};
pub use photo::{Photo, PhotoContent, PhotoSource};
pub use transport::{HttpTransport, ProgressSink, Transport, TransportError};

pub type Result<T> = std::result::Result<T, Error>;

// export libs
pub use image;
pub use url;
