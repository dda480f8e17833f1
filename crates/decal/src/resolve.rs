//! The image resolver.
//!
//! [`ImageResolver::resolve`] turns an [`ImageReference`] into a drawable
//! [`Bitmap`] and never fails: whatever goes wrong along the way ends in a
//! placeholder bitmap. The steps are
//!
//! 1. embedded `data:` URLs decode locally, without a fetch;
//! 2. remote URLs on the proxy allow list are rewritten through the
//!    storefront's image proxy;
//! 3. the (possibly rewritten) URL is fetched anonymously, and the pixels
//!    count only if the response is same-origin or CORS-approved;
//! 4. otherwise the original URL is retried once with credentials, giving a
//!    bitmap that taints whatever surface it is drawn on;
//! 5. otherwise a placeholder is synthesized.
//!
//! Every network fetch is bounded by the configured deadline. Each call to
//! `resolve` ticks the shared [`LoadProgress`] exactly once; export passes
//! use [`ImageResolver::resolve_untracked`] so they never advance a preview
//! round.

pub mod decode;
pub mod fetch;
pub mod placeholder;
mod progress;
pub mod proxy;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, info, warn};
use thiserror::Error;
use tiny_skia::Pixmap;
use url::Url;

use decal_core::{geometry::Size, image_ref::ImageReference};

use crate::{config::ResolverConfig, error::DecalError};

pub use fetch::{FetchError, FetchMode, FetchedImage, HttpFetcher, ImageFetcher};
pub use progress::LoadProgress;

use decode::{DataUrl, DecodeError, decode_pixmap};
use placeholder::{UNAVAILABLE_LABEL, placeholder};
use proxy::{allows_origin, is_same_origin, proxied_url};

/// Where a bitmap's pixels came from, and therefore whether they may be
/// read back after drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitmapOrigin {
    /// Embedded data, same-origin responses and synthesized placeholders.
    Local,
    /// A cross-origin response whose server approved the storefront origin.
    CorsApproved,
    /// A cross-origin response fetched without approval.
    Tainted,
}

/// A decoded, drawable image.
#[derive(Clone)]
pub struct Bitmap {
    pixmap: Arc<Pixmap>,
    origin: BitmapOrigin,
    placeholder: bool,
}

impl Bitmap {
    pub fn new(pixmap: Arc<Pixmap>, origin: BitmapOrigin) -> Self {
        Self {
            pixmap,
            origin,
            placeholder: false,
        }
    }

    /// Wraps a synthesized placeholder.
    pub fn placeholder(pixmap: Pixmap) -> Self {
        Self {
            pixmap: Arc::new(pixmap),
            origin: BitmapOrigin::Local,
            placeholder: true,
        }
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Returns the bitmap's natural size in pixels.
    pub fn natural_size(&self) -> Size {
        Size::new(self.width() as f32, self.height() as f32)
    }

    pub fn origin(&self) -> BitmapOrigin {
        self.origin
    }

    pub fn is_tainted(&self) -> bool {
        self.origin == BitmapOrigin::Tainted
    }

    /// Returns `true` if this bitmap stands in for an image that could not
    /// be loaded.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("origin", &self.origin)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

#[derive(Debug, Error)]
enum ResolveError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unsupported image reference `{0}`")]
    Unsupported(String),
}

/// Resolves image references to bitmaps.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    config: ResolverConfig,
    origin: Url,
    progress: Arc<LoadProgress>,
    cache: Mutex<HashMap<String, Bitmap>>,
}

impl fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResolver")
            .field("origin", &self.origin.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageResolver {
    /// Creates a resolver that fetches through `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`DecalError::Config`] if the configured origin is invalid.
    pub fn new(config: ResolverConfig, fetcher: Arc<dyn ImageFetcher>) -> Result<Self, DecalError> {
        let origin = config.origin().map_err(DecalError::Config)?;
        Ok(Self {
            fetcher,
            config,
            origin,
            progress: Arc::new(LoadProgress::new()),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a resolver backed by [`HttpFetcher`].
    pub fn with_http(config: ResolverConfig) -> Result<Self, DecalError> {
        let origin = config.origin().map_err(DecalError::Config)?;
        let fetcher = HttpFetcher::new(origin).map_err(DecalError::config)?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Returns the progress counter this resolver ticks.
    pub fn progress(&self) -> &Arc<LoadProgress> {
        &self.progress
    }

    /// Resolves `reference` to a bitmap. Never fails; see the module docs.
    pub async fn resolve(&self, reference: &ImageReference) -> Bitmap {
        let bitmap = self.resolve_untracked(reference).await;
        self.progress.record();
        bitmap
    }

    /// Parses `src` and resolves it.
    pub async fn resolve_src(&self, src: &str) -> Bitmap {
        self.resolve(&ImageReference::parse(src)).await
    }

    /// Resolves `reference` without ticking the load progress.
    pub async fn resolve_untracked(&self, reference: &ImageReference) -> Bitmap {
        let key = cache_key(reference);
        if let Some(bitmap) = self.cached(&key) {
            return bitmap;
        }

        let result = match reference {
            ImageReference::Embedded(src) => decode_embedded(src),
            ImageReference::Remote(url) => self.fetch_remote(url).await,
            ImageReference::Relative(path) => match self.origin.join(path) {
                Ok(url) => self.fetch_remote(&url).await,
                Err(_) => Err(ResolveError::Unsupported(path.clone())),
            },
            ImageReference::Redacted(name) => {
                debug!(name = name.as_str(); "Image was not stored with the design");
                return Bitmap::placeholder(placeholder(name));
            }
            ImageReference::Unsupported(src) => Err(ResolveError::Unsupported(src.clone())),
        };

        match result {
            Ok(bitmap) => {
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, bitmap.clone());
                bitmap
            }
            Err(err) => {
                warn!(reference:% = reference, err:err; "Image unavailable, using placeholder");
                Bitmap::placeholder(placeholder(UNAVAILABLE_LABEL))
            }
        }
    }

    fn cached(&self, key: &str) -> Option<Bitmap> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Bitmap, ResolveError> {
        let target = proxied_url(url, &self.config, &self.origin).unwrap_or_else(|| url.clone());
        if &target != url {
            debug!(url = url.as_str(), proxied = target.as_str(); "Routing image through proxy");
        }

        match self.fetch_anonymous(&target).await {
            Ok(bitmap) => return Ok(bitmap),
            Err(err) => {
                debug!(url = target.as_str(), err:err; "Anonymous fetch failed, retrying with credentials");
            }
        }

        let fetched = self.fetch_with_deadline(url, FetchMode::Credentialed).await?;
        let pixmap = decode_pixmap(fetched.bytes(), fetched.content_type())?;
        let origin = if is_same_origin(url, &self.origin) {
            BitmapOrigin::Local
        } else {
            info!(url = url.as_str(); "Loaded cross-origin image without approval");
            BitmapOrigin::Tainted
        };
        Ok(Bitmap::new(Arc::new(pixmap), origin))
    }

    async fn fetch_anonymous(&self, url: &Url) -> Result<Bitmap, ResolveError> {
        let fetched = self.fetch_with_deadline(url, FetchMode::Anonymous).await?;
        let origin = if is_same_origin(url, &self.origin) {
            BitmapOrigin::Local
        } else if allows_origin(fetched.allow_origin(), &self.origin) {
            BitmapOrigin::CorsApproved
        } else {
            return Err(FetchError::NotApproved.into());
        };

        let pixmap = decode_pixmap(fetched.bytes(), fetched.content_type())?;
        Ok(Bitmap::new(Arc::new(pixmap), origin))
    }

    async fn fetch_with_deadline(
        &self,
        url: &Url,
        mode: FetchMode,
    ) -> Result<FetchedImage, FetchError> {
        let deadline = self.config.fetch_timeout();
        tokio::time::timeout(deadline, self.fetcher.fetch(url, mode))
            .await
            .map_err(|_| FetchError::Timeout(deadline))?
    }
}

fn cache_key(reference: &ImageReference) -> String {
    match reference {
        ImageReference::Embedded(src) => src.clone(),
        other => other.to_string(),
    }
}

fn decode_embedded(src: &str) -> Result<Bitmap, ResolveError> {
    let data = DataUrl::parse(src)?;
    let pixmap = decode_pixmap(data.bytes(), data.media_type())?;
    Ok(Bitmap::new(Arc::new(pixmap), BitmapOrigin::Local))
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;
    use crate::resolve::decode::encode_data_url;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Serves canned responses keyed by `(url, mode)`; everything else 404s.
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<(String, FetchMode), FetchedImage>,
        calls: Mutex<Vec<(String, FetchMode)>>,
    }

    impl FakeFetcher {
        fn respond(mut self, url: &str, mode: FetchMode, image: FetchedImage) -> Self {
            self.responses.insert((url.to_string(), mode), image);
            self
        }

        fn calls(&self) -> Vec<(String, FetchMode)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchedImage, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), mode));
            self.responses
                .get(&(url.to_string(), mode))
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    /// Never answers.
    struct HangingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for HangingFetcher {
        async fn fetch(&self, _url: &Url, _mode: FetchMode) -> Result<FetchedImage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn resolver(fetcher: Arc<dyn ImageFetcher>) -> ImageResolver {
        ImageResolver::new(ResolverConfig::default(), fetcher).unwrap()
    }

    #[tokio::test]
    async fn test_embedded_image_needs_no_fetch() {
        let fetcher = Arc::new(FakeFetcher::default());
        let resolver = resolver(fetcher.clone());
        let src = encode_data_url("image/png", &png_bytes(3, 4));

        let bitmap = resolver.resolve_src(&src).await;
        assert!(!bitmap.is_placeholder());
        assert_eq!((bitmap.width(), bitmap.height()), (3, 4));
        assert_eq!(bitmap.origin(), BitmapOrigin::Local);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cors_approved_remote_image() {
        let url = "https://cdn.example.com/logo.png";
        let fetcher = Arc::new(FakeFetcher::default().respond(
            url,
            FetchMode::Anonymous,
            FetchedImage::new(png_bytes(2, 2)).with_allow_origin("*"),
        ));
        let bitmap = resolver(fetcher.clone()).resolve_src(url).await;

        assert_eq!(bitmap.origin(), BitmapOrigin::CorsApproved);
        assert!(!bitmap.is_tainted());
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unapproved_remote_image_is_tainted() {
        let url = "https://cdn.example.com/logo.png";
        let fetcher = Arc::new(
            FakeFetcher::default()
                .respond(url, FetchMode::Anonymous, FetchedImage::new(png_bytes(2, 2)))
                .respond(url, FetchMode::Credentialed, FetchedImage::new(png_bytes(2, 2))),
        );
        let bitmap = resolver(fetcher.clone()).resolve_src(url).await;

        assert!(bitmap.is_tainted());
        assert!(!bitmap.is_placeholder());
        assert_eq!(
            fetcher.calls(),
            vec![
                (url.to_string(), FetchMode::Anonymous),
                (url.to_string(), FetchMode::Credentialed),
            ]
        );
    }

    #[tokio::test]
    async fn test_allow_listed_host_goes_through_proxy_then_original() {
        let url = "https://storage.googleapis.com/bucket/shirt.png";
        let fetcher = Arc::new(FakeFetcher::default().respond(
            url,
            FetchMode::Credentialed,
            FetchedImage::new(png_bytes(1, 1)),
        ));
        let bitmap = resolver(fetcher.clone()).resolve_src(url).await;

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.starts_with("http://localhost:3000/api/image-proxy?url=https%3A%2F%2F"));
        assert_eq!(calls[0].1, FetchMode::Anonymous);
        assert_eq!(calls[1], (url.to_string(), FetchMode::Credentialed));
        assert!(bitmap.is_tainted());
    }

    #[tokio::test]
    async fn test_proxied_same_origin_response_is_local() {
        let url = "https://storage.googleapis.com/bucket/shirt.png";
        let proxied = proxied_url(
            &Url::parse(url).unwrap(),
            &ResolverConfig::default(),
            &Url::parse("http://localhost:3000").unwrap(),
        )
        .unwrap();
        let fetcher = Arc::new(FakeFetcher::default().respond(
            proxied.as_str(),
            FetchMode::Anonymous,
            FetchedImage::new(png_bytes(5, 5)),
        ));
        let bitmap = resolver(fetcher).resolve_src(url).await;

        assert_eq!(bitmap.origin(), BitmapOrigin::Local);
        assert_eq!(bitmap.width(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_image_becomes_placeholder() {
        let fetcher = Arc::new(FakeFetcher::default());
        let resolver = resolver(fetcher.clone());
        let bitmap = resolver.resolve_src("https://cdn.example.com/missing.png").await;

        assert!(bitmap.is_placeholder());
        assert!(!bitmap.is_tainted());
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(resolver.progress().loaded(), 1);
    }

    #[tokio::test]
    async fn test_redacted_and_unsupported_references_never_fetch() {
        let fetcher = Arc::new(FakeFetcher::default());
        let resolver = resolver(fetcher.clone());

        assert!(resolver.resolve_src("[EXTERNAL:logo.png]").await.is_placeholder());
        assert!(resolver.resolve_src("ftp://example.com/x.png").await.is_placeholder());
        assert!(resolver.resolve_src("data:image/png;base64,@@@").await.is_placeholder());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_ticks_once_per_call() {
        let fetcher = Arc::new(FakeFetcher::default());
        let resolver = resolver(fetcher);
        let src = encode_data_url("image/png", &png_bytes(1, 1));
        resolver.progress().expect(4);

        resolver.resolve_src(&src).await;
        resolver.resolve_src(&src).await;
        resolver.resolve_src("[EXTERNAL:a.png]").await;
        assert!(!resolver.progress().is_ready());
        resolver.resolve_src("https://cdn.example.com/404.png").await;

        assert_eq!(resolver.progress().loaded(), 4);
        assert!(resolver.progress().is_ready());
    }

    #[tokio::test]
    async fn test_untracked_resolve_leaves_progress_alone() {
        let resolver = resolver(Arc::new(FakeFetcher::default()));
        let src = encode_data_url("image/png", &png_bytes(2, 2));
        resolver.progress().expect(1);

        let bitmap = resolver.resolve_untracked(&ImageReference::parse(&src)).await;
        assert!(!bitmap.is_placeholder());
        assert_eq!(resolver.progress().loaded(), 0);
        assert!(!resolver.progress().is_ready());
    }

    #[tokio::test]
    async fn test_successful_bitmaps_are_cached() {
        let url = "http://localhost:3000/images/mug.png";
        let fetcher = Arc::new(FakeFetcher::default().respond(
            url,
            FetchMode::Anonymous,
            FetchedImage::new(png_bytes(2, 3)),
        ));
        let resolver = resolver(fetcher.clone());

        let first = resolver.resolve_src("/images/mug.png").await;
        let second = resolver.resolve_src("/images/mug.png").await;
        assert_eq!(first.origin(), BitmapOrigin::Local);
        assert_eq!(second.height(), 3);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_settles_at_deadline() {
        let fetcher = Arc::new(HangingFetcher {
            calls: AtomicUsize::new(0),
        });
        let config = ResolverConfig::default().with_fetch_timeout(Duration::from_millis(500));
        let resolver = ImageResolver::new(config, fetcher.clone()).unwrap();

        let started = tokio::time::Instant::now();
        let bitmap = resolver.resolve_src("https://cdn.example.com/slow.png").await;

        assert!(bitmap.is_placeholder());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
        assert!(resolver.progress().is_ready());
    }
}
