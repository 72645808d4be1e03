//! Reference photo fetching for quotation line items.
//!
//! Photos are fetched with a bounded number of requests in flight and a timeout per fetch.
//! A failed photo never fails the quotation; the caller gets one `Result` per item, in
//! item order, and decides what to log.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use image::ImageFormat;
use image::imageops::FilterType;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;

/// Why a photo could not be embedded.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("no photo url")]
    Missing,

    #[error("request failed: {0}")]
    Request(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Source of raw photo bytes.
#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PhotoError>;
}

/// Fetcher used when photo embedding is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPhotoFetcher;

#[async_trait]
impl PhotoFetcher for NoPhotoFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PhotoError> {
        Err(PhotoError::Missing)
    }
}

/// Fetches photos over HTTP(S).
#[cfg(feature = "web")]
#[derive(Debug, Clone)]
pub struct HttpPhotoFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "web")]
impl HttpPhotoFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "web")]
#[async_trait]
impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PhotoError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PhotoError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhotoError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PhotoError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Limits applied while fetching and sizing photos
#[derive(Debug, Clone)]
pub struct PhotoOptions {
    /// Upper bound for a single fetch, including reading the body
    pub timeout: Duration,

    /// Number of fetches allowed in flight at once
    pub concurrency: usize,

    /// Bounding box, in pixels, the embedded image is scaled to fit
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PhotoOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            concurrency: 4,
            max_width: 100,
            max_height: 100,
        }
    }
}

/// A decoded photo, re-encoded as PNG at its display size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPhoto {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode arbitrary image bytes and scale them to fit the bounding box
///
/// Any format the `image` crate understands is accepted; the output is always PNG so the
/// workbook only ever carries one image type. Aspect ratio is preserved.
///
/// # Arguments
/// * `bytes` - Raw image file contents
/// * `max_width`, `max_height` - Bounding box in pixels
///
/// # Returns
/// * `Result<PreparedPhoto, PhotoError>` - The PNG and its pixel size, or a decode error
pub fn prepare_photo(bytes: &[u8], max_width: u32, max_height: u32) -> Result<PreparedPhoto, PhotoError> {
    let decoded = image::load_from_memory(bytes)?;
    let scaled = decoded.resize(max_width.max(1), max_height.max(1), FilterType::Triangle);

    let mut png = Vec::new();
    scaled.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(PreparedPhoto {
        png,
        width: scaled.width(),
        height: scaled.height(),
    })
}

async fn fetch_one(
    fetcher: &dyn PhotoFetcher,
    url: &str,
    options: &PhotoOptions,
) -> Result<PreparedPhoto, PhotoError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(PhotoError::Missing);
    }

    let bytes = tokio::time::timeout(options.timeout, fetcher.fetch(url))
        .await
        .map_err(|_| PhotoError::Timeout(options.timeout))??;

    prepare_photo(&bytes, options.max_width, options.max_height)
}

/// Fetch and prepare every photo, at most `options.concurrency` at a time
///
/// # Returns
/// * One result per url, in the same order as `urls`
pub async fn fetch_all(
    fetcher: &dyn PhotoFetcher,
    urls: Vec<String>,
    options: &PhotoOptions,
) -> Vec<Result<PreparedPhoto, PhotoError>> {
    stream::iter(urls)
        .map(|url| async move { fetch_one(fetcher, &url, options).await })
        .buffered(options.concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    struct Fixed(Vec<u8>);

    #[async_trait]
    impl PhotoFetcher for Fixed {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PhotoError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl PhotoFetcher for Slow {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PhotoError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn scales_wide_image_into_box() {
        let photo = prepare_photo(&png_bytes(400, 200), 100, 100).unwrap();
        assert_eq!((photo.width, photo.height), (100, 50));
        assert!(photo.png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let result = prepare_photo(b"<html>not found</html>", 100, 100);
        assert!(matches!(result, Err(PhotoError::Decode(_))));
    }

    #[tokio::test]
    async fn empty_url_is_not_fetched() {
        let results = fetch_all(&Fixed(png_bytes(10, 10)), urls(&["", "  "]), &PhotoOptions::default()).await;
        assert!(results.iter().all(|r| matches!(r, Err(PhotoError::Missing))));
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let list = urls(&["http://a", "", "http://c"]);
        let results = fetch_all(&Fixed(png_bytes(20, 20)), list, &PhotoOptions::default()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(PhotoError::Missing)));
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let options = PhotoOptions {
            timeout: Duration::from_millis(50),
            ..PhotoOptions::default()
        };
        let results = fetch_all(&Slow, urls(&["http://slow"]), &options).await;
        assert!(matches!(results[0], Err(PhotoError::Timeout(_))));
    }
}
