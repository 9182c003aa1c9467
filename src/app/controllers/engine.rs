use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use super::style_injector::StyleInjector;
use super::theme_injector::ThemeInjector;
use crate::app::domain::{EngineConfig, FontDescriptor, HostIdentity, Message, Theme};
use crate::app::infrastructure::dom::Document;
use crate::app::infrastructure::fetcher::ResourceFetcher;
use crate::app::infrastructure::storage::Storage;
use crate::app::services::catalog::FontCatalog;
use crate::app::services::css_builder::FontCssBuilder;
use crate::app::services::font_cache::FontCache;
use crate::app::services::inliner::FontInliner;
use crate::app::services::site_settings::SiteSettingsStore;

/// Font and theme override engine for one document.
///
/// Construct one per document. The font cache may be shared between
/// engines; everything else is owned per document. Methods take `&self` so
/// an engine behind an `Rc` can serve overlapping updates: each update
/// captures a generation number when issued and drops its result if a newer
/// update was issued while it was suspended. Startup replay takes its number
/// before reading the stored setting, so a message that lands during that
/// read is not overwritten by the older setting.
pub struct PageEngine<S, F> {
    document: Rc<RefCell<Document>>,
    builder: FontCssBuilder<S, F>,
    styles: StyleInjector,
    themes: RefCell<ThemeInjector>,
    generation: Cell<u64>,
}

impl<S, F> PageEngine<S, F>
where
    S: Storage + 'static,
    F: ResourceFetcher + 'static,
{
    pub fn new(
        document: Rc<RefCell<Document>>,
        cache: Rc<FontCache<S>>,
        fetcher: Rc<F>,
        config: &EngineConfig,
    ) -> Self {
        let inliner = FontInliner::new(Rc::clone(&cache), fetcher, config.fetch_timeout());
        let builder = FontCssBuilder::new(cache, inliner, config.cache_lookup_timeout());
        Self {
            styles: StyleInjector::new(Rc::clone(&document)),
            themes: RefCell::new(ThemeInjector::new(
                Rc::clone(&document),
                config.theme_stylesheet.clone(),
            )),
            document,
            builder,
            generation: Cell::new(0),
        }
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    /// Number of updates issued so far.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Applies the theme at once and the font override once its CSS is built.
    ///
    /// Returns the background inlining task when this update missed the
    /// cache. It may be dropped; awaiting it only waits for the cache write.
    pub async fn apply(
        &self,
        font: Option<&FontDescriptor>,
        enabled: bool,
        theme: Theme,
    ) -> Option<JoinHandle<()>> {
        let issued = self.issue();
        self.apply_at(issued, font, enabled, theme).await
    }

    fn issue(&self) -> u64 {
        let issued = self.generation.get() + 1;
        self.generation.set(issued);
        issued
    }

    fn is_stale(&self, issued: u64) -> bool {
        let latest = self.generation.get();
        if latest != issued {
            debug!("Dropping stale update {} (latest is {})", issued, latest);
        }
        latest != issued
    }

    /// `issued` must still be the latest generation when this is called.
    async fn apply_at(
        &self,
        issued: u64,
        font: Option<&FontDescriptor>,
        enabled: bool,
        theme: Theme,
    ) -> Option<JoinHandle<()>> {
        self.themes.borrow_mut().apply(theme, enabled);

        let css = self.builder.build(font, enabled).await;
        if self.is_stale(issued) {
            return css.background;
        }
        self.styles.apply(&css.text);
        css.background
    }

    pub async fn handle_message(&self, message: Message) -> Option<JoinHandle<()>> {
        match message {
            Message::UpdateFont {
                font,
                enabled,
                theme,
            } => self.apply(font.as_ref(), enabled, theme).await,
        }
    }

    /// Decodes and handles a raw transport message. Unknown actions are ignored.
    pub async fn handle_json(&self, raw: &str) -> Option<JoinHandle<()>> {
        match Message::from_json(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!("Ignoring message: {}", e);
                None
            }
        }
    }

    /// Replays the stored setting for `host` at page load.
    ///
    /// The inline descriptor wins over the catalog key. A key missing from the
    /// catalog means no font override; the theme still applies.
    pub async fn start(
        &self,
        host: &HostIdentity,
        settings: &SiteSettingsStore<S>,
        catalog: &FontCatalog,
    ) -> Option<JoinHandle<()>> {
        // Messages that arrive while the setting is being read win over it.
        let issued = self.issue();
        let setting = settings.get(host).await?;
        if self.is_stale(issued) {
            return None;
        }
        if !setting.enabled {
            debug!("Overrides disabled for {}", host);
            return None;
        }

        let font = setting
            .font_data
            .clone()
            .or_else(|| catalog.resolve(&setting.selected_font).cloned());
        if font.is_none() && !setting.selected_font.is_empty() {
            info!("Font '{}' is not in the catalog", setting.selected_font);
        }
        self.apply_at(issued, font.as_ref(), setting.enabled, setting.theme)
            .await
    }

    /// Text of the injected style node, if one is attached.
    pub fn injected_css(&self) -> Option<String> {
        let node = self.styles.current()?;
        let doc = self.document.borrow();
        doc.is_connected(node)
            .then(|| doc.text_content(node).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::controllers::style_injector::STYLE_ELEMENT_ID;
    use crate::app::domain::{FontType, SiteSetting};
    use crate::app::infrastructure::dom::NodeId;
    use crate::app::infrastructure::storage::MemoryStorage;
    use crate::app::services::exclusions::{override_applies, override_rule};
    use crate::app::test_support::{block_on_local, GatedStorage, MockFetcher, ROBOTO_IMPORT};
    use tokio::sync::oneshot;

    type TestEngine = PageEngine<MemoryStorage, MockFetcher>;

    fn engine(
        cache: &Rc<FontCache<MemoryStorage>>,
        fetcher: &Rc<MockFetcher>,
    ) -> TestEngine {
        PageEngine::new(
            Rc::new(RefCell::new(Document::with_skeleton())),
            Rc::clone(cache),
            Rc::clone(fetcher),
            &EngineConfig::default(),
        )
    }

    fn style_nodes(doc: &Document) -> Vec<NodeId> {
        doc.descendants()
            .into_iter()
            .filter(|&n| doc.attribute(n, "id") == Some(STYLE_ELEMENT_ID))
            .collect()
    }

    fn root_classes<S, F>(engine: &PageEngine<S, F>) -> Vec<String>
    where
        S: Storage + 'static,
        F: ResourceFetcher + 'static,
    {
        let doc = engine.document().borrow();
        let root = doc.document_element().unwrap();
        doc.class_list(root).into_iter().map(str::to_string).collect()
    }

    /// Font family the injected override gives `node`, if any.
    fn overridden_family(doc: &Document, node: NodeId) -> Option<String> {
        let style = *style_nodes(doc).first()?;
        let css = doc.text_content(style);
        let start = css.find("font-family: '")? + "font-family: '".len();
        let family = &css[start..start + css[start..].find('\'')?];
        let class = doc.attribute(node, "class").unwrap_or_default();
        override_applies(doc.tag_name(node), class).then(|| family.to_string())
    }

    #[test]
    fn test_repeated_apply_is_idempotent() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::new());
            let engine = engine(&cache, &fetcher);
            let font = FontDescriptor::system("Georgia");

            engine.apply(Some(&font), true, Theme::None).await;
            let first = engine.injected_css().unwrap();
            engine.apply(Some(&font), true, Theme::None).await;

            assert_eq!(style_nodes(&engine.document().borrow()).len(), 1);
            assert_eq!(engine.injected_css().unwrap(), first);
            assert_eq!(first, override_rule("Georgia"));
        });
    }

    #[test]
    fn test_disable_removes_style_and_theme() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::new());
            let engine = engine(&cache, &fetcher);
            let font = FontDescriptor::system("Georgia");

            engine.apply(Some(&font), true, Theme::Dark).await;
            assert_eq!(root_classes(&engine), vec!["ext-theme-dark"]);

            engine.apply(Some(&font), false, Theme::Dark).await;
            assert!(style_nodes(&engine.document().borrow()).is_empty());
            assert!(root_classes(&engine).is_empty());
        });
    }

    #[test]
    fn test_icon_elements_keep_their_font() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::new());
            let engine = engine(&cache, &fetcher);
            let (icon, div) = {
                let mut doc = engine.document().borrow_mut();
                let body = doc.body().unwrap();
                let icon = doc.create_element("i");
                doc.set_attribute(icon, "class", "fa fa-home");
                let div = doc.create_element("div");
                doc.append_child(body, icon);
                doc.append_child(body, div);
                (icon, div)
            };

            engine
                .apply(Some(&FontDescriptor::system("Test")), true, Theme::None)
                .await;

            let doc = engine.document().borrow();
            assert_eq!(overridden_family(&doc, div).as_deref(), Some("Test"));
            assert_eq!(overridden_family(&doc, icon), None);
        });
    }

    #[test]
    fn test_theme_sequence() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::new());
            let engine = engine(&cache, &fetcher);

            engine.apply(None, true, Theme::Dark).await;
            assert_eq!(root_classes(&engine), vec!["ext-theme-dark"]);
            engine.apply(None, true, Theme::Sepia).await;
            assert_eq!(root_classes(&engine), vec!["ext-theme-sepia"]);
            engine.apply(None, true, Theme::None).await;
            assert!(root_classes(&engine).is_empty());
        });
    }

    #[test]
    fn test_roboto_end_to_end() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::roboto());
            let engine = engine(&cache, &fetcher);
            let roboto = FontDescriptor::google("Roboto", ROBOTO_IMPORT);

            let background = engine.apply(Some(&roboto), true, Theme::None).await;
            let css = engine.injected_css().unwrap();
            assert_eq!(css, format!("{}\n{}", ROBOTO_IMPORT, override_rule("Roboto")));

            background.expect("cache miss spawns inlining").await.unwrap();
            let cached = cache.get("Roboto").await.unwrap();
            assert!(!cached.contains("fonts.example"));

            // Offline reload in a fresh document uses only embedded data.
            fetcher.set_offline(true);
            let requests_before = fetcher.requests().len();
            let reloaded = self::engine(&cache, &fetcher);
            let background = reloaded.apply(Some(&roboto), true, Theme::None).await;
            assert!(background.is_none());

            let css = reloaded.injected_css().unwrap();
            assert!(css.starts_with(&cached));
            assert!(!css.contains("@import"));
            let remote_refs = css
                .match_indices("url(")
                .filter(|(i, _)| !css[*i..].starts_with("url('data:"))
                .count();
            assert_eq!(remote_refs, 0);
            assert_eq!(fetcher.requests().len(), requests_before);
        });
    }

    #[test]
    fn test_stale_update_is_dropped() {
        block_on_local(async {
            let (release, gate) = oneshot::channel();
            let storage = Rc::new(GatedStorage::new(gate));
            let cache = Rc::new(FontCache::new(storage));
            let engine = Rc::new(PageEngine::new(
                Rc::new(RefCell::new(Document::with_skeleton())),
                cache,
                Rc::new(MockFetcher::new()),
                &EngineConfig::default(),
            ));
            let lato = FontDescriptor::new("Lato", FontType::Google, None);
            let inter = FontDescriptor::new("Inter", FontType::Google, None);

            let earlier = {
                let engine = Rc::clone(&engine);
                tokio::task::spawn_local(async move {
                    engine.apply(Some(&lato), true, Theme::Dark).await;
                })
            };
            // Let the earlier update reach the gated cache read.
            tokio::task::yield_now().await;

            engine.apply(Some(&inter), true, Theme::Sepia).await;
            release.send(()).unwrap();
            earlier.await.unwrap();

            assert_eq!(engine.generation(), 2);
            assert_eq!(engine.injected_css().unwrap(), override_rule("Inter"));
            let doc = engine.document().borrow();
            assert_eq!(style_nodes(&doc).len(), 1);
            let root = doc.document_element().unwrap();
            assert_eq!(doc.class_list(root), vec!["ext-theme-sepia"]);
        });
    }

    #[test]
    fn test_message_during_startup_read_wins() {
        block_on_local(async {
            let (release, gate) = oneshot::channel();
            let storage = Rc::new(GatedStorage::new(gate));
            let host = HostIdentity::from_page_url("https://example.com/");
            let settings = Rc::new(SiteSettingsStore::new(Rc::clone(&storage)));
            settings
                .save(&host, &SiteSetting::new(true, "georgia", Some(FontDescriptor::system("Georgia")), Theme::Dark))
                .await
                .unwrap();

            let engine = Rc::new(PageEngine::new(
                Rc::new(RefCell::new(Document::with_skeleton())),
                Rc::new(FontCache::new(storage)),
                Rc::new(MockFetcher::new()),
                &EngineConfig::default(),
            ));
            let startup = {
                let engine = Rc::clone(&engine);
                let settings = Rc::clone(&settings);
                tokio::task::spawn_local(async move {
                    engine.start(&host, &settings, &FontCatalog::fallback()).await;
                })
            };
            // Let startup reach the gated settings read.
            tokio::task::yield_now().await;

            engine
                .apply(Some(&FontDescriptor::system("Inter")), true, Theme::Sepia)
                .await;
            release.send(()).unwrap();
            startup.await.unwrap();

            assert_eq!(engine.injected_css().unwrap(), override_rule("Inter"));
            assert_eq!(root_classes(&engine), vec!["ext-theme-sepia"]);
        });
    }

    #[test]
    fn test_theme_applies_before_font_lookup_finishes() {
        block_on_local(async {
            let (release, gate) = oneshot::channel();
            let cache = Rc::new(FontCache::new(Rc::new(GatedStorage::new(gate))));
            let engine = Rc::new(PageEngine::new(
                Rc::new(RefCell::new(Document::with_skeleton())),
                cache,
                Rc::new(MockFetcher::new()),
                &EngineConfig::default(),
            ));
            let lato = FontDescriptor::new("Lato", FontType::Google, None);

            let pending = {
                let engine = Rc::clone(&engine);
                tokio::task::spawn_local(async move {
                    engine.apply(Some(&lato), true, Theme::Gray).await;
                })
            };
            tokio::task::yield_now().await;

            assert_eq!(root_classes(&engine), vec!["ext-theme-gray"]);
            assert!(engine.injected_css().is_none());

            release.send(()).unwrap();
            pending.await.unwrap();
            assert_eq!(engine.injected_css().unwrap(), override_rule("Lato"));
        });
    }

    #[test]
    fn test_engines_share_cache() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::roboto());
            let roboto = FontDescriptor::google("Roboto", ROBOTO_IMPORT);

            let first_tab = engine(&cache, &fetcher);
            if let Some(task) = first_tab.apply(Some(&roboto), true, Theme::None).await {
                task.await.unwrap();
            }

            let second_tab = engine(&cache, &fetcher);
            assert!(second_tab.apply(Some(&roboto), true, Theme::None).await.is_none());
            assert!(second_tab.injected_css().unwrap().starts_with("@font-face"));
        });
    }

    #[test]
    fn test_handle_json() {
        block_on_local(async {
            let cache = Rc::new(FontCache::new(Rc::new(MemoryStorage::new())));
            let fetcher = Rc::new(MockFetcher::new());
            let engine = engine(&cache, &fetcher);

            let raw = r#"{"action": "updateFont", "font": {"name": "Georgia", "type": "system"}, "enabled": true, "theme": "gray"}"#;
            engine.handle_json(raw).await;
            assert_eq!(engine.injected_css().unwrap(), override_rule("Georgia"));
            assert_eq!(root_classes(&engine), vec!["ext-theme-gray"]);

            assert!(engine.handle_json(r#"{"action": "ping"}"#).await.is_none());
            assert_eq!(engine.generation(), 1);
        });
    }

    #[test]
    fn test_start_with_inline_descriptor() {
        block_on_local(async {
            let storage = Rc::new(MemoryStorage::new());
            let cache = Rc::new(FontCache::new(Rc::clone(&storage)));
            let fetcher = Rc::new(MockFetcher::new());
            let settings = SiteSettingsStore::new(Rc::clone(&storage));
            let host = HostIdentity::from_page_url("https://example.com/post");
            settings
                .save(&host, &SiteSetting::new(true, "georgia", Some(FontDescriptor::system("Georgia")), Theme::Dark))
                .await
                .unwrap();

            let engine = engine(&cache, &fetcher);
            engine.start(&host, &settings, &FontCatalog::fallback()).await;

            assert_eq!(engine.injected_css().unwrap(), override_rule("Georgia"));
            assert_eq!(root_classes(&engine), vec!["ext-theme-dark"]);
        });
    }

    #[test]
    fn test_start_resolves_catalog_key() {
        block_on_local(async {
            let storage = Rc::new(MemoryStorage::new());
            let cache = Rc::new(FontCache::new(Rc::clone(&storage)));
            let fetcher = Rc::new(MockFetcher::new());
            let settings = SiteSettingsStore::new(Rc::clone(&storage));
            let host = HostIdentity::from_page_url("https://example.com/");
            settings
                .save(&host, &SiteSetting::new(true, "arial", None, Theme::None))
                .await
                .unwrap();

            let engine = engine(&cache, &fetcher);
            engine.start(&host, &settings, &FontCatalog::fallback()).await;
            assert_eq!(engine.injected_css().unwrap(), override_rule("Arial"));
        });
    }

    #[test]
    fn test_start_with_missing_catalog_entry() {
        block_on_local(async {
            let storage = Rc::new(MemoryStorage::new());
            let cache = Rc::new(FontCache::new(Rc::clone(&storage)));
            let fetcher = Rc::new(MockFetcher::new());
            let settings = SiteSettingsStore::new(Rc::clone(&storage));
            let host = HostIdentity::unknown();
            settings
                .save(&host, &SiteSetting::new(true, "removedFont", None, Theme::Sepia))
                .await
                .unwrap();

            let engine = engine(&cache, &fetcher);
            engine.start(&host, &settings, &FontCatalog::fallback()).await;
            assert!(engine.injected_css().is_none());
            assert_eq!(root_classes(&engine), vec!["ext-theme-sepia"]);
        });
    }

    #[test]
    fn test_start_disabled_or_unknown_host() {
        block_on_local(async {
            let storage = Rc::new(MemoryStorage::new());
            let cache = Rc::new(FontCache::new(Rc::clone(&storage)));
            let fetcher = Rc::new(MockFetcher::new());
            let settings = SiteSettingsStore::new(Rc::clone(&storage));
            let host = HostIdentity::from_page_url("https://example.com/");
            settings
                .save(&host, &SiteSetting::new(false, "arial", None, Theme::Dark))
                .await
                .unwrap();

            let engine = engine(&cache, &fetcher);
            engine.start(&host, &settings, &FontCatalog::fallback()).await;
            engine
                .start(&HostIdentity::from_page_url("https://other.example/"), &settings, &FontCatalog::fallback())
                .await;

            assert!(engine.injected_css().is_none());
            assert!(root_classes(&engine).is_empty());
        });
    }
}
