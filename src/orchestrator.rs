//! Event routing between the browser surface, the preference store, and the
//! theme backend.
//!
//! The orchestrator owns per-window theme state and a best-effort per-tab
//! cache of the last computed colors. Preferences are re-read from the store
//! on every event so external edits take effect immediately. Backend
//! failures are logged and swallowed: a broken theme call must never take
//! down the event loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::backends::ThemeBackend;
use crate::color::Color;
use crate::prefs::{normalize_host, PrefStore};
use crate::theme::{compose_theme, ThemeColors};

/// Identity of a browser tab as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: u32,
    pub window_id: u32,
    pub url: String,
}

/// Everything that can make the chrome theme change.
#[derive(Debug)]
pub enum Event {
    /// An extraction pass finished for a tab.
    Colors {
        tab: TabInfo,
        primary: Option<Color>,
        accent: Option<Color>,
    },
    /// Preferences changed for `host`; re-evaluate the affected surface.
    Refresh {
        tab_id: Option<u32>,
        window_id: Option<u32>,
        host: String,
    },
    TabActivated,
    NavigationComplete,
    FocusChanged,
}

/// The browser surface the orchestrator talks back to.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// The currently focused tab, if any window has focus.
    async fn active_tab(&self) -> Option<TabInfo>;

    /// Ask the content side to re-run extraction for a tab.
    async fn request_extraction(&self, tab_id: u32);
}

/// Per-window theme state. Transitions are driven only by events; applying
/// an identical theme twice still issues the backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Default,
    Themed(ThemeColors),
}

pub struct Orchestrator {
    store: PrefStore,
    backend: Arc<dyn ThemeBackend>,
    tabs: Arc<dyn TabHost>,
    window_states: HashMap<u32, WindowState>,
    last_tab_colors: HashMap<u32, ThemeColors>,
}

impl Orchestrator {
    pub fn new(store: PrefStore, backend: Arc<dyn ThemeBackend>, tabs: Arc<dyn TabHost>) -> Self {
        Self {
            store,
            backend,
            tabs,
            window_states: HashMap::new(),
            last_tab_colors: HashMap::new(),
        }
    }

    /// Drain `events` until the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("event channel closed, orchestrator stopping");
    }

    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::Colors {
                tab,
                primary,
                accent,
            } => self.on_colors(tab, primary, accent).await,
            Event::Refresh {
                tab_id,
                window_id,
                host,
            } => self.on_refresh(tab_id, window_id, &host).await,
            Event::TabActivated | Event::NavigationComplete | Event::FocusChanged => {
                self.refresh_active_tab().await
            }
        }
    }

    pub fn window_state(&self, window_id: u32) -> WindowState {
        self.window_states
            .get(&window_id)
            .copied()
            .unwrap_or(WindowState::Default)
    }

    /// Last colors computed for a tab, surviving until overwritten.
    pub fn last_colors(&self, tab_id: u32) -> Option<&ThemeColors> {
        self.last_tab_colors.get(&tab_id)
    }

    async fn on_colors(&mut self, tab: TabInfo, primary: Option<Color>, accent: Option<Color>) {
        let prefs = self.store.load().await;
        if !prefs.enabled || !is_http_url(&tab.url) {
            self.reset_window(tab.window_id).await;
            return;
        }
        if let Some(host) = host_of(&tab.url) {
            if prefs.site_disabled(&host) {
                debug!(%host, "theming disabled for site");
                self.reset_window(tab.window_id).await;
                return;
            }
        }

        let theme = compose_theme(primary, accent, &prefs);
        self.last_tab_colors.insert(tab.id, theme);
        self.apply_window(tab.window_id, theme).await;
    }

    /// Preference change fan-out. A targeted tab gets a fresh extraction;
    /// otherwise the affected window drops back to the default theme.
    async fn on_refresh(&mut self, tab_id: Option<u32>, window_id: Option<u32>, host: &str) {
        let prefs = self.store.load().await;
        let host_disabled = normalize_host(host)
            .map(|h| prefs.site_disabled(&h))
            .unwrap_or(false);

        if !prefs.enabled || host_disabled {
            if let Some(window_id) = window_id {
                self.reset_window(window_id).await;
            }
            return;
        }

        if let Some(tab_id) = tab_id {
            self.tabs.request_extraction(tab_id).await;
        } else if let Some(window_id) = window_id {
            self.reset_window(window_id).await;
        }
    }

    async fn refresh_active_tab(&mut self) {
        let Some(tab) = self.tabs.active_tab().await else {
            return;
        };
        let prefs = self.store.load().await;
        if !prefs.enabled || !is_http_url(&tab.url) {
            self.reset_window(tab.window_id).await;
            return;
        }
        self.tabs.request_extraction(tab.id).await;
    }

    async fn apply_window(&mut self, window_id: u32, colors: ThemeColors) {
        if let Err(e) = self.backend.update(window_id, &colors).await {
            warn!(
                backend = self.backend.name(),
                window_id, "theme update failed: {e:#}"
            );
        }
        self.window_states.insert(window_id, WindowState::Themed(colors));
    }

    pub async fn reset_window(&mut self, window_id: u32) {
        if let Err(e) = self.backend.reset(window_id).await {
            warn!(
                backend = self.backend.name(),
                window_id, "theme reset failed: {e:#}"
            );
        }
        self.window_states.insert(window_id, WindowState::Default);
    }
}

/// Only ordinary web pages get themed; privileged and local schemes keep
/// the default chrome.
pub fn is_http_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    normalize_host(parsed.host_str()?)
}
