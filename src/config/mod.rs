//! Configuration loading.
//!
//! Sources, first match wins for the file:
//! 1. an explicit path passed by the caller
//! 2. `.hybrid-context.yaml` in the current directory
//! 3. `config.yaml` in the per-user config directory
//! 4. built-in defaults
//!
//! Environment variables are applied on top, then the result is validated.

pub mod preset;
pub mod schema;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{HybridError, Result};
pub use schema::*;

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".hybrid-context.yaml";

pub const ENV_PRESET: &str = "HYBRID_CONTEXT_PRESET";
pub const ENV_WORKERS: &str = "HYBRID_CONTEXT_WORKERS";
pub const ENV_FALLBACK: &str = "HYBRID_CONTEXT_FALLBACK";
pub const ENV_QUERY_TIMEOUT_MS: &str = "HYBRID_CONTEXT_QUERY_TIMEOUT_MS";

/// Selector keys a preset may fill in when the file leaves them unset.
const PRESET_KEYS: &[&str] = &[
    "structural_threshold",
    "semantic_quality_floor",
    "hybrid_margin",
];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration from the first available source, apply environment
/// overrides, and validate.
pub fn load_config(explicit: Option<&Path>) -> Result<HybridConfig> {
    let mut config = match find_config_file(explicit)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            let contents = std::fs::read_to_string(&path)?;
            parse_config(&contents)?
        }
        None => HybridConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Resolve which file to load. An explicit path that does not exist is an
/// error; the implicit locations are simply skipped.
fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(HybridError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }
    Ok(user_config_path().filter(|p| p.exists()))
}

/// `<config dir>/hybrid-context/config.yaml` for the current user.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "hybrid-context", "hybrid-context")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

/// Parse YAML and apply the named preset to every threshold the file does
/// not set explicitly.
pub fn parse_config(yaml: &str) -> Result<HybridConfig> {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| HybridError::Config(format!("failed to parse config: {e}")))?;
    let mut config: HybridConfig = if raw.is_null() {
        HybridConfig::default()
    } else {
        serde_yaml::from_value(raw.clone())
            .map_err(|e| HybridError::Config(format!("invalid config: {e}")))?
    };

    let explicit_keys: Vec<&str> = PRESET_KEYS
        .iter()
        .copied()
        .filter(|key| raw.get("selector").and_then(|s| s.get(*key)).is_some())
        .collect();
    let preset = preset::get_preset(&config.preset);
    let mut tuned = config.selector.clone();
    preset.apply(&mut tuned);
    if !explicit_keys.contains(&"structural_threshold") {
        config.selector.structural_threshold = tuned.structural_threshold;
    }
    if !explicit_keys.contains(&"semantic_quality_floor") {
        config.selector.semantic_quality_floor = tuned.semantic_quality_floor;
    }
    if !explicit_keys.contains(&"hybrid_margin") {
        config.selector.hybrid_margin = tuned.hybrid_margin;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Apply `HYBRID_CONTEXT_*` overrides. `lookup` abstracts the environment so
/// tests need not mutate process state.
pub fn apply_env_overrides<F>(config: &mut HybridConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_PRESET) {
        let name = PresetName::from_str_loose(&value).ok_or_else(|| {
            HybridError::Config(format!("{ENV_PRESET}: unknown preset '{value}'"))
        })?;
        config.preset = name;
        preset::get_preset(&name).apply(&mut config.selector);
    }
    if let Some(value) = lookup(ENV_WORKERS) {
        config.worker_pool.workers = value.trim().parse().map_err(|_| {
            HybridError::Config(format!("{ENV_WORKERS}: expected a positive integer, got '{value}'"))
        })?;
    }
    if let Some(value) = lookup(ENV_FALLBACK) {
        config.selector.fallback_enabled = parse_bool(&value).ok_or_else(|| {
            HybridError::Config(format!("{ENV_FALLBACK}: expected a boolean, got '{value}'"))
        })?;
    }
    if let Some(value) = lookup(ENV_QUERY_TIMEOUT_MS) {
        config.retrieval.query_timeout_ms = value.trim().parse().map_err(|_| {
            HybridError::Config(format!(
                "{ENV_QUERY_TIMEOUT_MS}: expected milliseconds, got '{value}'"
            ))
        })?;
    }
    Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject out-of-range thresholds and weights and non-positive sizes.
pub fn validate(config: &HybridConfig) -> Result<()> {
    let s = &config.selector;
    check_unit("selector.structural_threshold", s.structural_threshold)?;
    check_unit("selector.semantic_quality_floor", s.semantic_quality_floor)?;
    check_unit("selector.hybrid_margin", s.hybrid_margin)?;

    let sw = &config.weights.structural;
    for (name, v) in [
        ("weights.structural.extension", sw.extension),
        ("weights.structural.query_type", sw.query_type),
        ("weights.structural.code_signals", sw.code_signals),
        ("weights.structural.line_specific", sw.line_specific),
        ("weights.structural.documentation_penalty", sw.documentation_penalty),
    ] {
        check_unit(name, v)?;
    }
    let mw = &config.weights.semantic;
    for (name, v) in [
        ("weights.semantic.extension", mw.extension),
        ("weights.semantic.documentation", mw.documentation),
        ("weights.semantic.prose", mw.prose),
        ("weights.semantic.scope", mw.scope),
        ("weights.semantic.query_type", mw.query_type),
    ] {
        check_unit(name, v)?;
    }

    check_positive("structural_cache.capacity", config.structural_cache.capacity as u64)?;
    check_positive("structural_cache.ttl_secs", config.structural_cache.ttl_secs)?;
    check_positive("decision_cache.capacity", config.decision_cache.capacity as u64)?;
    check_positive("decision_cache.ttl_secs", config.decision_cache.ttl_secs)?;
    check_positive("worker_pool.workers", config.worker_pool.workers as u64)?;
    check_positive("worker_pool.queue_capacity", config.worker_pool.queue_capacity as u64)?;
    check_positive("metrics.error_ring_capacity", config.metrics.error_ring_capacity as u64)?;
    check_positive("metrics.report_interval_ms", config.metrics.report_interval_ms)?;
    check_positive("retrieval.query_timeout_ms", config.retrieval.query_timeout_ms)?;
    check_positive("retrieval.path_timeout_ms", config.retrieval.path_timeout_ms)?;
    check_positive("retrieval.default_limit", config.retrieval.default_limit as u64)?;
    check_positive("selector.signature_chars", s.signature_chars as u64)?;

    if !(0.0..1.0).contains(&config.metrics.smoothing) {
        return Err(HybridError::Config(format!(
            "metrics.smoothing must be in [0, 1), got {}",
            config.metrics.smoothing
        )));
    }
    check_unit("retrieval.overlap_bonus", config.retrieval.overlap_bonus)?;
    Ok(())
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HybridError::Config(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn check_positive(name: &str, value: u64) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(HybridError::Config(format!("{name} must be positive")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
