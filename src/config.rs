use crate::maintenance::scheduler::AssignmentOrder;
use crate::maintenance::window::MaintenanceWindow;
use crate::shared::logging;
use crate::stack::model::StackSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "AURORAPLAN_CONFIG";
pub const BASE_WINDOW_ENV: &str = "AURORAPLAN_BASE_WINDOW";
pub const STEP_MINUTES_ENV: &str = "AURORAPLAN_STEP_MINUTES";
pub const ASSIGNMENT_ORDER_ENV: &str = "AURORAPLAN_ASSIGNMENT_ORDER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stack: StackSpec,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// `~/.auroraplan/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".auroraplan").join("config.json"))
}

/// Load config from a JSON file, then apply environment overrides
pub fn init_from_path(path: &str) -> Result<Config> {
    let config = load_file(Path::new(path))?;
    finish(config, |key| env::var(key).ok())
}

/// Config from `AURORAPLAN_CONFIG`, the home directory file, or built-in
/// defaults, in that order
pub fn init_default() -> Result<Config> {
    let config = if let Ok(path) = env::var(CONFIG_ENV) {
        logging::info(&format!("Using config from {}: {}", CONFIG_ENV, path));
        load_file(Path::new(&path))?
    } else {
        match default_config_path() {
            Some(path) if path.exists() => {
                logging::info(&format!("Using config file: {}", path.display()));
                load_file(&path)?
            }
            _ => {
                logging::debug("No config file found, using built-in stack");
                Config::default()
            }
        }
    };
    finish(config, |key| env::var(key).ok())
}

fn load_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn finish<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    apply_overrides(&mut config, lookup)?;
    config.stack.validate()?;
    Ok(config)
}

/// Applies `AURORAPLAN_*` overrides. A malformed value is an error rather
/// than being ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(BASE_WINDOW_ENV) {
        let window: MaintenanceWindow = value
            .parse()
            .with_context(|| format!("Invalid {}", BASE_WINDOW_ENV))?;
        logging::debug(&format!("Base maintenance window overridden: {}", window));
        config.stack.aurora.preferred_maintenance_window = window;
    }

    if let Some(value) = lookup(STEP_MINUTES_ENV) {
        config.stack.instance_maintenance.step_minutes = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", STEP_MINUTES_ENV, value))?;
    }

    if let Some(value) = lookup(ASSIGNMENT_ORDER_ENV) {
        config.stack.instance_maintenance.order = value
            .parse::<AssignmentOrder>()
            .with_context(|| format!("Invalid {}", ASSIGNMENT_ORDER_ENV))?;
    }

    Ok(())
}
