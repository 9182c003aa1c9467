use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use log::{error, info};
use tokio::task::{JoinHandle, LocalSet};

use font_changer::app::services::inliner::find_url_references;
use font_changer::app::{
    Document, EngineConfig, FontCache, FontCatalog, FontInliner, HostIdentity, HttpFetcher,
    JsonFileStorage, PageEngine, Result, SiteSetting, SiteSettingsStore, Theme,
};

const USAGE: &str = "\
Usage: font-changer <command> [args]

Commands:
  css <url> [<font-key>]                         Print the CSS injected for a page
  warm <font-key>                                Inline a catalog font into the cache
  set <url> <font-key|-> [<theme>] [--disabled]  Save the setting for a page's host
  cache                                          List cached fonts, oldest first
  fonts [<search>]                               List catalog fonts";

enum Command {
    Css { url: String, font_key: Option<String> },
    Warm { font_key: String },
    Set { url: String, font_key: Option<String>, theme: Theme, enabled: bool },
    Cache,
    Fonts { search: String },
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        match (name.as_str(), rest.as_slice()) {
            ("css", [url]) => Some(Command::Css { url: url.to_string(), font_key: None }),
            ("css", [url, key]) => Some(Command::Css {
                url: url.to_string(),
                font_key: Some(key.to_string()),
            }),
            ("warm", [key]) => Some(Command::Warm { font_key: key.to_string() }),
            ("set", [url, key, options @ ..]) => {
                let enabled = !options.contains(&"--disabled");
                let mut themes = options.iter().filter(|o| **o != "--disabled");
                let theme = match themes.next() {
                    Some(raw) => raw.parse().ok()?,
                    None => Theme::None,
                };
                if themes.next().is_some() {
                    return None;
                }
                let font_key = (*key != "-").then(|| key.to_string());
                Some(Command::Set { url: url.to_string(), font_key, theme, enabled })
            }
            ("cache", []) => Some(Command::Cache),
            ("fonts", []) => Some(Command::Fonts { search: String::new() }),
            ("fonts", [search]) => Some(Command::Fonts { search: search.to_string() }),
            _ => None,
        }
    }
}

/// Everything a command needs, built once from the config.
struct Context {
    config: EngineConfig,
    storage: Rc<JsonFileStorage>,
    cache: Rc<FontCache<JsonFileStorage>>,
    fetcher: Rc<HttpFetcher>,
    catalog: FontCatalog,
}

impl Context {
    fn new(config: EngineConfig) -> Self {
        let storage = Rc::new(JsonFileStorage::new(
            config.storage_path(),
            config.storage_quota_bytes,
        ));
        let cache = Rc::new(FontCache::with_capacity(
            Rc::clone(&storage),
            config.cache_capacity,
        ));
        let fetcher = Rc::new(HttpFetcher::from_config(&config));
        let catalog = FontCatalog::load_or_fallback(config.font_catalog.as_deref());
        Self {
            config,
            storage,
            cache,
            fetcher,
            catalog,
        }
    }

    fn engine(&self) -> PageEngine<JsonFileStorage, HttpFetcher> {
        PageEngine::new(
            Rc::new(RefCell::new(Document::with_skeleton())),
            Rc::clone(&self.cache),
            Rc::clone(&self.fetcher),
            &self.config,
        )
    }

    fn settings(&self) -> SiteSettingsStore<JsonFileStorage> {
        SiteSettingsStore::new(Rc::clone(&self.storage))
    }
}

async fn settle(background: Option<JoinHandle<()>>) {
    if let Some(task) = background {
        if let Err(e) = task.await {
            error!("Background inlining task failed: {}", e);
        }
    }
}

async fn run(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Css { url, font_key } => {
            let engine = ctx.engine();
            let background = match font_key {
                Some(key) => {
                    let Some(font) = ctx.catalog.get(&key) else {
                        eprintln!("Unknown font '{}'", key);
                        return Ok(ExitCode::FAILURE);
                    };
                    engine.apply(Some(font), true, Theme::None).await
                }
                None => {
                    let host = HostIdentity::from_page_url(&url);
                    engine.start(&host, &ctx.settings(), &ctx.catalog).await
                }
            };
            settle(background).await;
            match engine.injected_css() {
                Some(css) => println!("{}", css),
                None => info!("No font override for {}", url),
            }
        }
        Command::Warm { font_key } => {
            let Some(font) = ctx.catalog.get(&font_key) else {
                eprintln!("Unknown font '{}'", font_key);
                return Ok(ExitCode::FAILURE);
            };
            if font.import_rule().is_none() {
                eprintln!("'{}' has no stylesheet to inline", font.name());
                return Ok(ExitCode::FAILURE);
            }
            let inliner = FontInliner::new(
                Rc::clone(&ctx.cache),
                Rc::clone(&ctx.fetcher),
                ctx.config.fetch_timeout(),
            );
            inliner.cache_font(font).await?;

            let Some(css) = ctx.cache.get(font.name()).await else {
                eprintln!("{} was not cached", font.name());
                return Ok(ExitCode::FAILURE);
            };
            let remote = find_url_references(&css)
                .iter()
                .filter(|r| !r.target.starts_with("data:"))
                .count();
            if remote > 0 {
                println!("{} cached with {} remote reference(s) left", font.name(), remote);
            } else {
                println!("{} cached, self-contained", font.name());
            }
        }
        Command::Set { url, font_key, theme, enabled } => {
            let font = match &font_key {
                Some(key) => match ctx.catalog.get(key) {
                    Some(font) => Some(font.clone()),
                    None => {
                        eprintln!("Unknown font '{}'", key);
                        return Ok(ExitCode::FAILURE);
                    }
                },
                None => None,
            };
            let host = HostIdentity::from_page_url(&url);
            let setting = SiteSetting::new(enabled, font_key.unwrap_or_default(), font, theme);
            ctx.settings().save(&host, &setting).await?;
            println!("Saved setting for {}", host);
        }
        Command::Cache => {
            for name in ctx.cache.names().await {
                println!("{}", name);
            }
        }
        Command::Fonts { search } => {
            for (key, font) in ctx.catalog.search(&search) {
                println!("{:<24} {:<32} {}", key, font.name(), font.kind().display_name());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = Context::new(EngineConfig::load());
    match LocalSet::new().block_on(&runtime, run(command, &ctx)) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
