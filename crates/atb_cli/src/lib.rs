//! ATB CLI Library
//!
//! Scenario file → `simulate_battle` → JSON trace
//! Config presets → pretty JSON

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use atb_core::{simulate_battle, AtbConfig, BattleRequest, BattleResponse};

/// Overrides `-v` when set, e.g. `ATB_LOG=atb_core=debug`.
pub const LOG_ENV: &str = "ATB_LOG";

/// Built-in config presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// Concurrent gauges
    Atb,
    /// Strict queue
    Ctb,
}

impl Preset {
    pub fn config(self) -> AtbConfig {
        match self {
            Preset::Atb => AtbConfig::atb(),
            Preset::Ctb => AtbConfig::ctb(),
        }
    }
}

/// - 0 → `warn`
/// - 1 → `info`
/// - 2 → `debug`
/// - 3+ → `trace`
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the stderr subscriber. Safe to call more than once.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_scenario(path: &Path) -> Result<BattleRequest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
}

/// Run a scenario file, optionally writing the full trace to `out`.
pub fn simulate_file(scenario: &Path, out: Option<&Path>) -> Result<BattleResponse> {
    let request = load_scenario(scenario)?;
    let response = simulate_battle(&request)
        .with_context(|| format!("Simulation failed: {}", scenario.display()))?;

    if let Some(out) = out {
        let json = serde_json::to_string_pretty(&response)?;
        fs::write(out, json)
            .with_context(|| format!("Failed to write trace: {}", out.display()))?;
        info!(path = %out.display(), events = response.events.len(), "trace written");
    }
    Ok(response)
}

pub fn preset_json(preset: Preset) -> Result<String> {
    Ok(serde_json::to_string_pretty(&preset.config())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_to_directive(0), "warn");
        assert_eq!(verbosity_to_directive(1), "info");
        assert_eq!(verbosity_to_directive(2), "debug");
        assert_eq!(verbosity_to_directive(9), "trace");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(0);
        init_logging(3);
    }

    #[test]
    fn test_preset_json_round_trips_through_validation() {
        let json = preset_json(Preset::Ctb).unwrap();
        let config = AtbConfig::from_json(&json).unwrap();
        assert!(config.is_strict_queue());

        let json = preset_json(Preset::Atb).unwrap();
        assert!(!AtbConfig::from_json(&json).unwrap().is_strict_queue());
    }
}
