//! Configuration loader: merges env vars, .env file, and config.toml.

use common::config::AppConfig;
use common::{Error, MagnitudeFilter};
use std::net::SocketAddr;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.server.bind_addr.parse::<SocketAddr>().is_err() {
        issues.push(format!(
            "server.bind_addr must be a socket address, got {:?}",
            config.server.bind_addr
        ));
    }

    let base_url = config.feed.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        issues.push("feed.base_url must start with http:// or https://".into());
    }
    if config.feed.request_timeout_secs == 0 {
        issues.push("feed.request_timeout_secs must be > 0".into());
    }
    if config.feed.user_agent.trim().is_empty() {
        issues.push("feed.user_agent must not be empty".into());
    }

    if config.pipeline.deadline_ms == 0 {
        issues.push("pipeline.deadline_ms must be > 0".into());
    }

    for (name, secs) in [
        ("cache.past_hour_secs", config.cache.past_hour_secs),
        ("cache.past_day_secs", config.cache.past_day_secs),
        ("cache.past_7_days_secs", config.cache.past_7_days_secs),
        ("cache.past_30_days_secs", config.cache.past_30_days_secs),
    ] {
        if secs == 0 {
            issues.push(format!("{name} must be > 0"));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `QUAKEVIZ_*` overrides; `lookup` reads one variable.
fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(addr) = lookup("QUAKEVIZ_BIND_ADDR") {
        config.server.bind_addr = addr.trim().to_string();
    }
    if let Some(url) = lookup("QUAKEVIZ_FEED_URL") {
        config.feed.base_url = url.trim().to_string();
    }
    if let Some(raw) = lookup("QUAKEVIZ_MAGNITUDE") {
        config.feed.magnitude = MagnitudeFilter::from_slug(&raw).ok_or_else(|| {
            Error::Config(
                "QUAKEVIZ_MAGNITUDE must be one of: all, 1.0, 2.5, 4.5, significant".into(),
            )
        })?;
    }
    if let Some(raw) = lookup("QUAKEVIZ_DEADLINE_MS") {
        config.pipeline.deadline_ms = parse_positive_u64(&raw, "QUAKEVIZ_DEADLINE_MS")?;
    }
    if let Some(raw) = lookup("QUAKEVIZ_COALESCE_MISSES") {
        config.pipeline.coalesce_misses = parse_bool(&raw);
    }
    Ok(())
}

/// Load configuration from `.env`, the TOML file and the environment, then
/// apply the CLI listen-address override and validate.
pub fn load_config(path: Option<&Path>, bind_override: Option<&str>) -> Result<AppConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, then the config file. An explicit path must exist.
    let mut config = AppConfig::default();
    let config_path = match path {
        Some(p) => Some(p),
        None => Some(Path::new(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };
    if let Some(config_path) = config_path {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 3. Environment variables override the file.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // 4. CLI flags override everything.
    if let Some(addr) = bind_override {
        config.server.bind_addr = addr.trim().to_string();
    }

    validate_config(&config)?;

    Ok(config)
}
