use std::rc::Rc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use super::exclusions::override_rule;
use super::font_cache::FontCache;
use super::inliner::FontInliner;
use crate::app::domain::{FontDescriptor, FontType};
use crate::app::infrastructure::fetcher::ResourceFetcher;
use crate::app::infrastructure::storage::Storage;

/// CSS to inject for one font update.
#[derive(Debug)]
pub struct FontCss {
    /// Empty when the override is off.
    pub text: String,
    /// Inlining task spawned on a cache miss. Dropping it detaches the task.
    pub background: Option<JoinHandle<()>>,
}

impl FontCss {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            background: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Builds override CSS, preferring cached self-contained font faces over the
/// online `@import`.
#[derive(Debug)]
pub struct FontCssBuilder<S, F> {
    cache: Rc<FontCache<S>>,
    inliner: FontInliner<S, F>,
    lookup_timeout: Duration,
}

impl<S, F> FontCssBuilder<S, F>
where
    S: Storage + 'static,
    F: ResourceFetcher + 'static,
{
    pub fn new(cache: Rc<FontCache<S>>, inliner: FontInliner<S, F>, lookup_timeout: Duration) -> Self {
        Self {
            cache,
            inliner,
            lookup_timeout,
        }
    }

    pub async fn build(&self, font: Option<&FontDescriptor>, enabled: bool) -> FontCss {
        let Some(font) = font.filter(|_| enabled) else {
            return FontCss::empty();
        };

        let mut text = String::new();
        let mut background = None;

        if font.kind() == FontType::Google {
            match self.cached(font.name()).await {
                Some(cached) => {
                    info!("Using cached font: {}", font.name());
                    text.push_str(&cached);
                    text.push('\n');
                }
                None => {
                    if let Some(import_rule) = font.import_rule() {
                        info!("Using online font: {}", font.name());
                        text.push_str(import_rule);
                        text.push('\n');
                        background = Some(self.inliner.spawn(font.clone()));
                    } else {
                        debug!("No cached CSS or import for {}", font.name());
                    }
                }
            }
        }

        text.push_str(&override_rule(font.name()));
        FontCss { text, background }
    }

    async fn cached(&self, name: &str) -> Option<String> {
        match tokio::time::timeout(self.lookup_timeout, self.cache.get(name)).await {
            Ok(hit) => hit,
            Err(_) => {
                warn!("Font cache lookup for {} timed out, using online font", name);
                None
            }
        }
    }
}
