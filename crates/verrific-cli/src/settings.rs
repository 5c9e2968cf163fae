//! Option resolution: CLI flag > environment variable > config file > default.

use std::time::Duration;

use clap::Args;
use verrific_core::EnrichOptions;
use verrific_core::config_file::ConfigFile;
use verrific_grobid::{DEFAULT_GROBID_URL, GrobidConfig};

pub const DEFAULT_GLUTTON_URL: &str = "http://localhost:8080";

#[derive(Args, Debug, Default)]
pub struct GluttonArgs {
    /// biblio-glutton base URL [env: GLUTTON_URL] [default: http://localhost:8080]
    #[arg(long)]
    pub glutton_url: Option<String>,

    /// Per-lookup timeout in seconds [env: GLUTTON_TIMEOUT] [default: 10]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum concurrent lookups [env: GLUTTON_CONCURRENCY] [default: 5]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Give up on lookups still pending after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct GrobidArgs {
    /// GROBID server URL [env: GROBID_URL] [default: http://localhost:8070]
    #[arg(long)]
    pub grobid_url: Option<String>,

    /// Ask GROBID to consolidate citations against an external service
    #[arg(long)]
    pub consolidate_citations: bool,

    /// Ask GROBID to consolidate the header
    #[arg(long)]
    pub consolidate_header: bool,

    /// Ask GROBID to consolidate funders
    #[arg(long)]
    pub consolidate_funders: bool,

    /// First page to process (-1 for all)
    #[arg(long, allow_hyphen_values = true)]
    pub start: Option<i32>,

    /// Last page to process (-1 for all)
    #[arg(long, allow_hyphen_values = true)]
    pub end: Option<i32>,
}

fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    env(name).and_then(|v| v.trim().parse().ok())
}

/// Lookup service URL and enrichment options.
pub fn resolve_glutton(
    args: &GluttonArgs,
    env: impl Fn(&str) -> Option<String>,
    file: &ConfigFile,
) -> (String, EnrichOptions) {
    let section = file.glutton.clone().unwrap_or_default();
    let defaults = EnrichOptions::default();

    let url = args
        .glutton_url
        .clone()
        .or_else(|| env("GLUTTON_URL"))
        .or(section.url)
        .unwrap_or_else(|| DEFAULT_GLUTTON_URL.to_string());
    let timeout = args
        .timeout
        .or_else(|| env_parse(&env, "GLUTTON_TIMEOUT"))
        .or(section.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout);
    let concurrency = args
        .concurrency
        .or_else(|| env_parse(&env, "GLUTTON_CONCURRENCY"))
        .or(section.concurrency)
        .unwrap_or(defaults.concurrency);
    let deadline = args
        .deadline
        .or(section.deadline_secs)
        .map(Duration::from_secs);

    (
        url,
        EnrichOptions {
            timeout,
            concurrency,
            deadline,
        },
    )
}

pub fn resolve_grobid(
    args: &GrobidArgs,
    env: impl Fn(&str) -> Option<String>,
    file: &ConfigFile,
) -> GrobidConfig {
    let section = file.grobid.clone().unwrap_or_default();
    let defaults = GrobidConfig::default();

    GrobidConfig {
        url: args
            .grobid_url
            .clone()
            .or_else(|| env("GROBID_URL"))
            .or(section.url)
            .unwrap_or_else(|| DEFAULT_GROBID_URL.to_string()),
        start: args.start.unwrap_or(defaults.start),
        end: args.end.unwrap_or(defaults.end),
        consolidate_citations: args.consolidate_citations
            || section.consolidate_citations.unwrap_or(false),
        consolidate_header: args.consolidate_header || section.consolidate_header.unwrap_or(false),
        consolidate_funders: args.consolidate_funders
            || section.consolidate_funders.unwrap_or(false),
        max_attempts: section.max_attempts.unwrap_or(defaults.max_attempts),
        retry_wait: section
            .retry_wait_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_wait),
        ..defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use verrific_core::config_file::{GluttonConfig, GrobidConfig as GrobidSection};

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file_with_glutton(section: GluttonConfig) -> ConfigFile {
        ConfigFile {
            glutton: Some(section),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let (url, options) =
            resolve_glutton(&GluttonArgs::default(), env_from(&[]), &ConfigFile::default());
        assert_eq!(url, DEFAULT_GLUTTON_URL);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.deadline, None);
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = file_with_glutton(GluttonConfig {
            url: Some("http://file".into()),
            timeout_secs: Some(30),
            concurrency: Some(2),
            deadline_secs: Some(120),
        });
        let env = env_from(&[("GLUTTON_URL", "http://env"), ("GLUTTON_TIMEOUT", "20")]);
        let args = GluttonArgs {
            glutton_url: Some("http://flag".into()),
            ..Default::default()
        };

        let (url, options) = resolve_glutton(&args, env, &file);
        assert_eq!(url, "http://flag");
        assert_eq!(options.timeout, Duration::from_secs(20));
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.deadline, Some(Duration::from_secs(120)));
    }

    #[test]
    fn unparseable_env_falls_through() {
        let env = env_from(&[("GLUTTON_CONCURRENCY", "many")]);
        let (_, options) = resolve_glutton(&GluttonArgs::default(), env, &ConfigFile::default());
        assert_eq!(options.concurrency, 5);
    }

    #[test]
    fn grobid_flags_and_file() {
        let file = ConfigFile {
            grobid: Some(GrobidSection {
                url: Some("http://grobid-file:8070".into()),
                consolidate_header: Some(true),
                max_attempts: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let args = GrobidArgs {
            consolidate_citations: true,
            start: Some(1),
            ..Default::default()
        };

        let config = resolve_grobid(&args, env_from(&[]), &file);
        assert_eq!(config.url, "http://grobid-file:8070");
        assert!(config.consolidate_citations);
        assert!(config.consolidate_header);
        assert!(!config.consolidate_funders);
        assert_eq!(config.start, 1);
        assert_eq!(config.end, -1);
        assert_eq!(config.max_attempts, 5);

        let from_env = resolve_grobid(&args, env_from(&[("GROBID_URL", "http://env")]), &file);
        assert_eq!(from_env.url, "http://env");
    }
}
