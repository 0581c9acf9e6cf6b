//! Command line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pagetint",
    version,
    about = "Tint browser chrome from a page's dominant color"
)]
pub struct Args {
    /// Page to inspect: an http(s) URL or a local HTML file
    pub page: Option<String>,

    /// Write the theme manifest here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Paint color swatches to the terminal
    #[arg(long)]
    pub preview: bool,

    /// Preference file (defaults to the per-user config dir)
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<PathBuf>,

    /// Override the stored sampling scale for this run
    #[arg(long, value_name = "FACTOR")]
    pub sample_scale: Option<f64>,

    /// Override the stored minimum contrast for this run
    #[arg(long, value_name = "RATIO")]
    pub min_contrast: Option<f64>,

    /// Override the stored toolbar blend for this run
    #[arg(long, value_name = "FACTOR")]
    pub toolbar_blend: Option<f64>,

    /// Refuse to sample images hosted on other origins
    #[arg(long)]
    pub same_origin: bool,

    /// Flip the per-site disable flag for HOST, then exit if no page given
    #[arg(long, value_name = "HOST")]
    pub toggle_site: Option<String>,

    /// Turn theming on or off globally, then exit if no page given
    #[arg(long, value_name = "BOOL")]
    pub set_enabled: Option<bool>,

    /// Keep running, re-extracting every N seconds
    #[arg(long, value_name = "SECONDS")]
    pub watch: Option<u64>,
}
