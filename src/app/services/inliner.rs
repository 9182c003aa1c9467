//! Turns a remote web-font stylesheet into self-contained CSS.
//!
//! The stylesheet named by a descriptor's `@import` is fetched, and every
//! `url(...)` reference in it is replaced by a base64 `data:` URL of the
//! fetched resource. Replacement works on the byte range of each match, so a
//! URL that appears several times is resolved at every position. A resource
//! that fails to fetch keeps its original reference. The result goes into the
//! [`FontCache`] under the font's name.

use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::join_all;
use log::{error, info, warn};
use regex_lite::Regex;
use tokio::task::JoinHandle;
use url::Url;

use super::font_cache::FontCache;
use crate::app::domain::FontDescriptor;
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::infrastructure::fetcher::{FetchedResource, ResourceFetcher};
use crate::app::infrastructure::storage::Storage;

static IMPORT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid import pattern")
});

static RESOURCE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\(([^)]+)\)").expect("valid url() pattern"));

/// A `url(...)` token found in stylesheet text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReference {
    /// Byte range of the whole `url(...)` token.
    pub span: Range<usize>,
    /// The reference with surrounding whitespace and quotes removed.
    pub target: String,
}

/// URL of the stylesheet named in an `@import` statement.
pub fn extract_import_url(import_rule: &str) -> Option<String> {
    IMPORT_URL
        .captures(import_rule)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every `url(...)` token in `css`, in source order.
pub fn find_url_references(css: &str) -> Vec<UrlReference> {
    RESOURCE_URL
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps
                .get(1)?
                .as_str()
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .trim()
                .to_string();
            Some(UrlReference {
                span: whole.range(),
                target,
            })
        })
        .collect()
}

/// Media type for an embedded resource, from the response or the file extension.
fn mime_for(resource: &FetchedResource, url: &Url) -> String {
    if let Some(mime) = resource.mime_type() {
        return mime.to_string();
    }
    let extension = url
        .path()
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
    .to_string()
}

pub fn to_data_url(resource: &FetchedResource, url: &Url) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(resource, url),
        STANDARD.encode(&resource.bytes)
    )
}

/// Background font inliner. Cloning shares the cache and fetcher.
#[derive(Debug)]
pub struct FontInliner<S, F> {
    cache: Rc<FontCache<S>>,
    fetcher: Rc<F>,
    timeout: Duration,
}

impl<S, F> Clone for FontInliner<S, F> {
    fn clone(&self) -> Self {
        Self {
            cache: Rc::clone(&self.cache),
            fetcher: Rc::clone(&self.fetcher),
            timeout: self.timeout,
        }
    }
}

impl<S, F> FontInliner<S, F>
where
    S: Storage + 'static,
    F: ResourceFetcher + 'static,
{
    pub fn new(cache: Rc<FontCache<S>>, fetcher: Rc<F>, timeout: Duration) -> Self {
        Self {
            cache,
            fetcher,
            timeout,
        }
    }

    /// Runs [`cache_font`](Self::cache_font) as a detached local task.
    ///
    /// Must be called from within a `tokio::task::LocalSet`. Errors are logged;
    /// the handle resolves once the cache write has been attempted.
    pub fn spawn(&self, font: FontDescriptor) -> JoinHandle<()> {
        let inliner = self.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = inliner.cache_font(&font).await {
                error!("Error caching font {}: {}", font.name(), e);
            }
        })
    }

    /// Fetches, inlines and caches the stylesheet behind `font`'s `@import`.
    ///
    /// Fails without touching the cache when the import has no URL or the
    /// stylesheet cannot be fetched. A failed cache write is logged, not returned.
    pub async fn cache_font(&self, font: &FontDescriptor) -> Result<()> {
        let Some(import_rule) = font.import_rule() else {
            return Ok(());
        };
        let sheet_url = extract_import_url(import_rule)
            .ok_or_else(|| AppError::InvalidUrl(format!("no url() in '{}'", import_rule)))?;
        let sheet_url = Url::parse(&sheet_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", sheet_url, e)))?;

        let sheet = self.fetch(sheet_url.as_str()).await?;
        let inlined = self.inline_resources(&sheet_url, &sheet.text()).await;

        match self.cache.put(font.name(), inlined).await {
            Ok(_) => info!("Font cached successfully: {}", font.name()),
            Err(AppError::QuotaExceeded { .. }) => {
                warn!("Storage quota exceeded, could not cache font {}", font.name())
            }
            Err(e) => warn!("Could not cache font {}: {}", font.name(), e),
        }
        Ok(())
    }

    /// Replaces every fetchable `url(...)` in `css` with an embedded data URL.
    ///
    /// Relative references resolve against `base`. Existing `data:` URLs are
    /// kept as they are, and each distinct URL is fetched once.
    pub async fn inline_resources(&self, base: &Url, css: &str) -> String {
        let references = find_url_references(css);

        let mut targets: Vec<&str> = Vec::new();
        for reference in &references {
            let target = reference.target.as_str();
            if !target.starts_with("data:") && !targets.contains(&target) {
                targets.push(target);
            }
        }

        let embedded = join_all(targets.iter().map(|target| self.embed(base, target))).await;
        let resolved: HashMap<&str, String> = targets
            .iter()
            .zip(embedded)
            .filter_map(|(target, result)| match result {
                Ok(data_url) => Some((*target, data_url)),
                Err(e) => {
                    warn!("Failed to cache font file {}: {}", target, e);
                    None
                }
            })
            .collect();

        let mut out = String::with_capacity(css.len());
        let mut cursor = 0;
        for reference in &references {
            if let Some(data_url) = resolved.get(reference.target.as_str()) {
                out.push_str(&css[cursor..reference.span.start]);
                out.push_str("url('");
                out.push_str(data_url);
                out.push_str("')");
                cursor = reference.span.end;
            }
        }
        out.push_str(&css[cursor..]);
        out
    }

    async fn embed(&self, base: &Url, target: &str) -> Result<String> {
        let url = base
            .join(target)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", target, e)))?;
        let resource = self.fetch(url.as_str()).await?;
        Ok(to_data_url(&resource, &url))
    }

    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| AppError::Timeout(url.to_string()))?
    }
}
