//! Scripted transport and recording delegate shared by the unit tests.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, RgbaImage};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::delegate::{LoadDelegate, LoadEvent};
use crate::transport::{FetchFuture, FetchResult, ProgressSink, Transport, TransportError};
use crate::{Error, PhotoContent};

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::new(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Header and trailer only: enough for format sniffing.
pub fn gif_bytes() -> Vec<u8> {
    b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec()
}

/// A fetch the test answers by hand.
pub struct PendingFetch {
    pub url: Url,
    pub progress: ProgressSink,
    reply: oneshot::Sender<FetchResult>,
}

impl PendingFetch {
    /// Returns false if the fetch was already dropped by the coordinator.
    pub fn succeed(self, bytes: Vec<u8>) -> bool {
        self.reply.send(Ok(bytes)).is_ok()
    }

    pub fn fail(self, err: TransportError) -> bool {
        self.reply.send(Err(err)).is_ok()
    }

    /// Resolves once the coordinator has dropped (aborted) this fetch.
    pub async fn cancelled(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.reply.closed())
            .await
            .expect("fetch was never cancelled");
    }
}

pub struct MockTransport {
    fetches: mpsc::UnboundedSender<PendingFetch>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingFetch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            fetches: tx,
            calls: AtomicUsize::new(0),
        });
        (transport, rx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn fetch(&self, url: &Url, progress: ProgressSink) -> FetchFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        let _ = self.fetches.send(PendingFetch {
            url: url.clone(),
            progress,
            reply,
        });

        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(TransportError::Other("mock fetch dropped".to_owned())))
        })
    }
}

/// Delegate forwarding every callback into a channel.
pub struct ChannelDelegate<K> {
    tx: mpsc::UnboundedSender<LoadEvent<K>>,
}

pub fn recorder<K>() -> (ChannelDelegate<K>, mpsc::UnboundedReceiver<LoadEvent<K>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelDelegate { tx }, rx)
}

impl<K: Clone + Send + Sync + 'static> LoadDelegate<K> for ChannelDelegate<K> {
    fn on_event(&self, event: LoadEvent<K>) {
        let _ = self.tx.send(event);
    }

    fn on_success(&self, key: &K, content: PhotoContent) {
        self.on_event(LoadEvent::Success {
            key: key.clone(),
            generation: 0,
            content,
        });
    }

    fn on_failure(&self, key: &K, error: Error) {
        self.on_event(LoadEvent::Failure {
            key: key.clone(),
            generation: 0,
            error,
        });
    }
}

pub async fn next_event<K>(rx: &mut mpsc::UnboundedReceiver<LoadEvent<K>>) -> LoadEvent<K> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a load event")
        .expect("delegate channel closed")
}

/// Give spawned tasks a chance to run, then check nothing was delivered.
pub async fn assert_quiet<K: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<LoadEvent<K>>) {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    if let Ok(event) = rx.try_recv() {
        panic!("expected no callbacks, got {event:?}");
    }
}
