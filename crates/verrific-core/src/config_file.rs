use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub glutton: Option<GluttonConfig>,
    pub grobid: Option<GrobidConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GluttonConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrobidConfig {
    pub url: Option<String>,
    pub consolidate_citations: Option<bool>,
    pub consolidate_header: Option<bool>,
    pub consolidate_funders: Option<bool>,
    pub max_attempts: Option<u32>,
    pub retry_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

/// Platform config directory path: `<config_dir>/verrific/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("verrific").join("config.toml"))
}

/// Load config by cascading CWD `.verrific.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".verrific.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T>(overlay: Option<&S>, base: Option<&S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay.and_then(&field).or_else(|| base.and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bg, og) = (base.glutton.as_ref(), overlay.glutton.as_ref());
    let (bc, oc) = (base.grobid.as_ref(), overlay.grobid.as_ref());
    let (bd, od) = (base.display.as_ref(), overlay.display.as_ref());

    ConfigFile {
        glutton: Some(GluttonConfig {
            url: pick(og, bg, |g| g.url.clone()),
            timeout_secs: pick(og, bg, |g| g.timeout_secs),
            concurrency: pick(og, bg, |g| g.concurrency),
            deadline_secs: pick(og, bg, |g| g.deadline_secs),
        }),
        grobid: Some(GrobidConfig {
            url: pick(oc, bc, |g| g.url.clone()),
            consolidate_citations: pick(oc, bc, |g| g.consolidate_citations),
            consolidate_header: pick(oc, bc, |g| g.consolidate_header),
            consolidate_funders: pick(oc, bc, |g| g.consolidate_funders),
            max_attempts: pick(oc, bc, |g| g.max_attempts),
            retry_wait_secs: pick(oc, bc, |g| g.retry_wait_secs),
        }),
        display: Some(DisplayConfig {
            color: pick(od, bd, |d| d.color),
        }),
    }
}
