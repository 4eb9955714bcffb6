use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis_client::ShapePolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub analysis_service_url: String,
    pub analysis_timeout: Duration,
    pub shape_policy: ShapePolicy,
    /// When false, every PDF upload fails with `EngineUnavailable`.
    pub pdf_engine_enabled: bool,
    /// Sessions untouched for this long are torn down by the idle sweep.
    pub session_idle_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let analysis_service_url = lookup("ANALYSIS_SERVICE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("Required environment variable 'ANALYSIS_SERVICE_URL' is not set")?;

        let timeout_secs = lookup("ANALYSIS_TIMEOUT_SECS")
            .unwrap_or_else(|| "45".to_string())
            .parse::<u64>()
            .context("ANALYSIS_TIMEOUT_SECS must be a whole number of seconds")?;

        let shape_policy = lookup("RESPONSE_SHAPE_POLICY")
            .unwrap_or_else(|| "lenient".to_string())
            .parse::<ShapePolicy>()
            .map_err(anyhow::Error::msg)
            .context("RESPONSE_SHAPE_POLICY must be 'lenient' or 'strict'")?;

        let pdf_engine_enabled = parse_flag(
            "PDF_ENGINE_ENABLED",
            &lookup("PDF_ENGINE_ENABLED").unwrap_or_else(|| "true".to_string()),
        )?;

        let idle_secs = lookup("SESSION_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse::<u64>()
            .context("SESSION_IDLE_TIMEOUT_SECS must be a whole number of seconds")?;
        if idle_secs == 0 {
            anyhow::bail!("SESSION_IDLE_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            analysis_service_url: analysis_service_url.trim().to_string(),
            analysis_timeout: Duration::from_secs(timeout_secs),
            shape_policy,
            pdf_engine_enabled,
            session_idle_timeout: Duration::from_secs(idle_secs),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{key} must be true or false, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("ANALYSIS_SERVICE_URL", "http://svc.local/webhook")]).unwrap();
        assert_eq!(config.analysis_service_url, "http://svc.local/webhook");
        assert_eq!(config.analysis_timeout, Duration::from_secs(45));
        assert_eq!(config.shape_policy, ShapePolicy::Lenient);
        assert!(config.pdf_engine_enabled);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_service_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("ANALYSIS_SERVICE_URL"));
        assert!(load(&[("ANALYSIS_SERVICE_URL", "  ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ANALYSIS_SERVICE_URL", "http://svc"),
            ("ANALYSIS_TIMEOUT_SECS", "10"),
            ("RESPONSE_SHAPE_POLICY", "strict"),
            ("PDF_ENGINE_ENABLED", "off"),
            ("SESSION_IDLE_TIMEOUT_SECS", "600"),
            ("PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.session_idle_timeout, Duration::from_secs(600));
        assert_eq!(config.analysis_timeout, Duration::from_secs(10));
        assert_eq!(config.shape_policy, ShapePolicy::Strict);
        assert!(!config.pdf_engine_enabled);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let base = ("ANALYSIS_SERVICE_URL", "http://svc");
        assert!(load(&[base, ("ANALYSIS_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[base, ("RESPONSE_SHAPE_POLICY", "picky")]).is_err());
        assert!(load(&[base, ("PDF_ENGINE_ENABLED", "maybe")]).is_err());
        assert!(load(&[base, ("SESSION_IDLE_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[base, ("PORT", "99999")]).is_err());
    }
}
