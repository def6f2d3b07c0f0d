/// `load_config` module: reads the site's `_config.yml` and extracts the `contentful` section.
///
/// This is the only place where the user's YAML is parsed into the core's typed
/// [`SiteConfig`]. Everything else in the site config (the generator's own keys)
/// is ignored.
///
/// # Responsibilities
/// - Parse the config file and fail with a clear message when it is unreadable or malformed
/// - Expand `{{env.NAME}}` placeholders in per-collection query strings
/// - Derive the site root (the directory holding the config file), where collections are written
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use anyhow::Result;
use cms_sync_core::config::SiteConfig;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("env placeholder pattern is a valid regex")
});

#[derive(Debug)]
pub struct CliConfig {
    pub site: SiteConfig,
    /// Directory collections are written below.
    pub site_root: PathBuf,
}

/// Loads the site config file and returns its `contentful` section.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        contentful: Option<SiteConfig>,
    }

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let Some(mut site) = raw.contentful else {
        error!(config_path = ?path_ref, "Config has no contentful section");
        return Err(anyhow::anyhow!(
            "Config file {:?} has no `contentful` section",
            path_ref
        ));
    };

    for (collection, cfg) in site.content_types.iter_mut() {
        if let Some(query) = cfg.query.as_deref() {
            let expanded = expand_env(query);
            if expanded != query {
                info!(collection = %collection, "Expanded environment placeholders in query");
            }
            cfg.query = Some(expanded);
        }
    }

    let site_root = match path_ref.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    site.trace_loaded();

    Ok(CliConfig { site, site_root })
}

/// Replaces `{{env.NAME}}` with the variable's value; unset variables expand to nothing.
pub fn expand_env(raw: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(raw, |captures: &Captures<'_>| match env::var(&captures[1]) {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = &captures[1], "Environment variable in query is not set");
                String::new()
            }
        })
        .into_owned()
}
