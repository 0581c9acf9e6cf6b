use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use url::Url;

use pagetint::backends::{ManifestBackend, ThemeBackend};
use pagetint::cli::Args;
use pagetint::extractor::{DocumentSource, Extractor, FileSource, HttpSource};
use pagetint::orchestrator::{Event, Orchestrator, TabHost, TabInfo};
use pagetint::pipeline::{default_strategies, run_cascade, ImageSampler};
use pagetint::prefs::{
    PrefStore, ThemePreferences, MIN_CONTRAST_RANGE, SAMPLE_SCALE_RANGE, TOOLBAR_BLEND_RANGE,
};
use pagetint::theme::compose_theme;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagetint=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let store = match &args.prefs {
        Some(path) => PrefStore::new(path.clone()),
        None => PrefStore::new(PrefStore::default_path().context("no user config directory")?),
    };

    let mut administered = false;
    if let Some(value) = args.set_enabled {
        store.set_enabled(value).await?;
        println!("theming {}", if value { "enabled" } else { "disabled" });
        administered = true;
    }
    if let Some(host) = &args.toggle_site {
        let disabled = store.toggle_site(host).await?;
        println!(
            "{host}: theming {}",
            if disabled { "disabled" } else { "enabled" }
        );
        administered = true;
    }

    let Some(page) = args.page.clone() else {
        if administered {
            return Ok(());
        }
        bail!("no page given; see --help");
    };

    let (url, source) = open_page(&page)?;
    let mut prefs = store.load().await;
    apply_overrides(&mut prefs, &args);

    let sampler = ImageSampler::new(prefs.sample_scale, !args.same_origin);
    let backend = Arc::new(ManifestBackend::new(args.output.clone(), args.preview));

    let tab = TabInfo {
        id: 1,
        window_id: 1,
        url: url.to_string(),
    };

    if let Some(secs) = args.watch {
        return watch(store, backend, source, sampler, tab, secs).await;
    }

    // One-shot: run the cascade directly and emit the manifest.
    if !prefs.enabled {
        info!("theming disabled globally, restoring default");
        backend.reset(tab.window_id).await?;
        return Ok(());
    }
    if let Some(host) = url.host_str() {
        if prefs.site_disabled(host) {
            info!(host, "theming disabled for site, restoring default");
            backend.reset(tab.window_id).await?;
            return Ok(());
        }
    }

    let snapshot = source
        .snapshot()
        .await
        .with_context(|| format!("failed to load {page}"))?;
    let primary = run_cascade(&snapshot, &sampler, &default_strategies()).await;
    if primary.is_none() {
        info!("no color signal found, using fallback");
    }
    let theme = compose_theme(primary, None, &prefs);
    backend.update(tab.window_id, &theme).await?;
    Ok(())
}

/// Re-extract on a fixed cadence until interrupted, running the full
/// event loop: ticker, debounced extractor, orchestrator, backend.
async fn watch(
    store: PrefStore,
    backend: Arc<ManifestBackend>,
    source: Arc<dyn DocumentSource>,
    sampler: ImageSampler,
    tab: TabInfo,
    secs: u64,
) -> Result<()> {
    let interval = Duration::from_secs(secs.max(1));
    let (event_tx, event_rx) = mpsc::channel(16);
    let (trigger_tx, trigger_rx) = mpsc::channel(16);

    let tabs = Arc::new(SingleTab {
        tab: tab.clone(),
        triggers: trigger_tx,
    });
    let extractor = Extractor::new(source, sampler, tab, event_tx.clone());
    tokio::spawn(extractor.run(trigger_rx));

    let orchestrator = Orchestrator::new(store, backend as Arc<dyn ThemeBackend>, tabs);
    tokio::spawn(orchestrator.run(event_rx));

    let ticker = async {
        loop {
            if event_tx.send(Event::NavigationComplete).await.is_err() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
    };
    tokio::select! {
        _ = ticker => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}

/// The single-page stand-in for a browser's tab list.
struct SingleTab {
    tab: TabInfo,
    triggers: mpsc::Sender<()>,
}

#[async_trait]
impl TabHost for SingleTab {
    async fn active_tab(&self) -> Option<TabInfo> {
        Some(self.tab.clone())
    }

    async fn request_extraction(&self, _tab_id: u32) {
        let _ = self.triggers.send(()).await;
    }
}

fn open_page(page: &str) -> Result<(Url, Arc<dyn DocumentSource>)> {
    if let Ok(url) = Url::parse(page) {
        return match url.scheme() {
            "http" | "https" => Ok((url.clone(), Arc::new(HttpSource::new(url)))),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("not a local file URL: {url}"))?;
                let source = FileSource::new(path)?;
                let base = source.base().clone();
                Ok((base, Arc::new(source)))
            }
            other => bail!("unsupported scheme {other:?}; expected http, https, or file"),
        };
    }
    let source = FileSource::new(PathBuf::from(page))?;
    let base = source.base().clone();
    Ok((base, Arc::new(source)))
}

fn apply_overrides(prefs: &mut ThemePreferences, args: &Args) {
    if let Some(v) = args.sample_scale {
        prefs.sample_scale = v.clamp(SAMPLE_SCALE_RANGE.0, SAMPLE_SCALE_RANGE.1);
    }
    if let Some(v) = args.min_contrast {
        prefs.min_contrast = v.clamp(MIN_CONTRAST_RANGE.0, MIN_CONTRAST_RANGE.1);
    }
    if let Some(v) = args.toolbar_blend {
        prefs.toolbar_blend = v.clamp(TOOLBAR_BLEND_RANGE.0, TOOLBAR_BLEND_RANGE.1);
    }
}
