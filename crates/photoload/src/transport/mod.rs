//! Pluggable byte transports used by the coordinator to fetch photo URLs.

mod network;

use std::{future::Future, pin::Pin, sync::Arc};

use url::Url;

pub use network::{resolve_redirect, HttpTransport};

pub type FetchResult = Result<Vec<u8>, TransportError>;
pub type FetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send + 'static>>;

/// Fetches the bytes behind a URL.
///
/// The returned future is spawned by the coordinator, which aborts it to
/// cancel the fetch. A transport may report progress through `progress` at
/// any point before the future resolves.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, url: &Url, progress: ProgressSink) -> FetchFuture;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, url: &Url, progress: ProgressSink) -> FetchFuture {
        (**self).fetch(url, progress)
    }
}

/// Where a transport reports how far along a fetch is.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(f32) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(report: impl Fn(f32) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report a fraction in `0..=1`. Out of range values are clamped, NaN is dropped.
    pub fn report(&self, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        (self.report)(fraction.clamp(0.0, 1.0));
    }

    /// Report progress from a byte count. Nothing is reported when the
    /// expected length is unknown.
    pub fn report_bytes(&self, received: usize, expected: Option<usize>) {
        match expected {
            Some(expected) if expected > 0 => self.report(received as f32 / expected as f32),
            _ => {}
        }
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("hyper error: {0}")]
    Hyper(Box<dyn std::error::Error + Send + Sync>),

    #[error("missing host in URL")]
    Host,

    #[error("invalid URI")]
    Uri,

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("body too large")]
    BodyTooLarge,

    #[error("too many redirect responses")]
    TooManyRedirects,

    #[error("redirect response missing Location header")]
    MissingRedirectLocation,

    #[error("invalid redirect Location header")]
    InvalidRedirectLocation,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub(crate) fn hyper(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        TransportError::Hyper(Box::new(e))
    }

    /// Connection level failures and server side statuses may go away on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Hyper(_) | TransportError::Other(_) => true,
            TransportError::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            _ => false,
        }
    }
}
