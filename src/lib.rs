//! Derive a browser chrome theme from the dominant color of a web page.
//!
//! The pipeline snapshots a document, walks an ordered cascade of
//! extraction heuristics (theme-color meta, logo, favicon, prominent
//! button, largest image, page background), and composes a full chrome
//! color set honoring user preferences. An event-driven orchestrator
//! applies or resets themes per window through a pluggable backend.

pub mod backends;
pub mod cli;
pub mod color;
pub mod extractor;
pub mod orchestrator;
pub mod pipeline;
pub mod prefs;
pub mod theme;
