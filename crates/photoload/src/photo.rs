use std::sync::Arc;

use image::DynamicImage;
use url::Url;

/// A photo to display: caption text plus whatever content is known for it.
///
/// Content is resolved with a fixed precedence: raw bytes win over a decoded
/// image, which wins over the URL. Raw bytes are where animated GIF data goes.
#[derive(Clone, Default)]
pub struct Photo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub credit: Option<String>,
    pub image_data: Option<Arc<[u8]>>,
    pub image: Option<Arc<DynamicImage>>,
    pub url: Option<Url>,
}

/// Where a photo's content comes from, borrowed from the photo.
#[derive(Debug, Clone, Copy)]
pub enum PhotoSource<'a> {
    Bytes(&'a Arc<[u8]>),
    Image(&'a Arc<DynamicImage>),
    Url(&'a Url),
}

/// Loaded content, ready to hand to a display surface.
///
/// `Bytes` is left for the consumer to decode as a still or animated image.
#[derive(Clone)]
pub enum PhotoContent {
    Bytes(Arc<[u8]>),
    Image(Arc<DynamicImage>),
}

impl Photo {
    pub fn from_url(url: Url) -> Self {
        Self {
            url: Some(url),
            ..Default::default()
        }
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            image_data: Some(bytes.into()),
            ..Default::default()
        }
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Some(Arc::new(image)),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.credit = Some(credit.into());
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// The first present content source, in precedence order.
    pub fn source(&self) -> Option<PhotoSource<'_>> {
        if let Some(bytes) = &self.image_data {
            Some(PhotoSource::Bytes(bytes))
        } else if let Some(image) = &self.image {
            Some(PhotoSource::Image(image))
        } else {
            self.url.as_ref().map(PhotoSource::Url)
        }
    }

    /// Content that can be displayed without any network activity.
    pub fn cached_content(&self) -> Option<PhotoContent> {
        match self.source()? {
            PhotoSource::Bytes(bytes) => Some(PhotoContent::Bytes(bytes.clone())),
            PhotoSource::Image(image) => Some(PhotoContent::Image(image.clone())),
            PhotoSource::Url(_) => None,
        }
    }

    /// A photo with a URL can have its cached content dropped and fetched again.
    pub fn is_reducible(&self) -> bool {
        self.url.is_some()
    }

    /// Store freshly loaded content in the matching field.
    pub fn cache_content(&mut self, content: PhotoContent) {
        match content {
            PhotoContent::Bytes(bytes) => self.image_data = Some(bytes),
            PhotoContent::Image(image) => self.image = Some(image),
        }
    }

    /// Drop cached bytes and image. Returns false, leaving the photo
    /// untouched, when there is no URL to fetch them again from.
    pub fn clear_cached_content(&mut self) -> bool {
        if !self.is_reducible() {
            return false;
        }

        self.image_data = None;
        self.image = None;
        true
    }
}

impl std::fmt::Debug for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Photo")
            .field("title", &self.title)
            .field("image_data", &self.image_data.as_ref().map(|b| b.len()))
            .field("image", &self.image.is_some())
            .field("url", &self.url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl PhotoContent {
    pub fn is_bytes(&self) -> bool {
        matches!(self, PhotoContent::Bytes(_))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PhotoContent::Bytes(bytes) => Some(bytes),
            PhotoContent::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            PhotoContent::Bytes(_) => None,
            PhotoContent::Image(image) => Some(image),
        }
    }
}

impl std::fmt::Debug for PhotoContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Image(image) => f
                .debug_tuple("Image")
                .field(&(image.width(), image.height()))
                .finish(),
        }
    }
}
