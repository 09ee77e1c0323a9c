use std::{fs, path::Path, path::PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type LineId = u32;

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Hash, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Debug, Default, Hash, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDetect {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl EdgeDetect {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            EdgeDetect::None => "none",
            EdgeDetect::Rising => "rising",
            EdgeDetect::Falling => "falling",
            EdgeDetect::Both => "both",
        }
    }
}

/// A switch input paired with the indicator output it drives.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LineBinding {
    pub name: String,
    pub switch: LineId,
    pub indicator: LineId,
    #[serde(default = "default_edge")]
    pub edge: EdgeDetect,
}

fn default_edge() -> EdgeDetect {
    EdgeDetect::Both
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    pub bindings: Vec<LineBinding>,
}

impl Default for AppConfig {
    // GPIO1_16 / GPIO1_17 switches, GPIO1_12 / GPIO0_26 indicators.
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            bindings: vec![
                LineBinding {
                    name: "player-1".into(),
                    switch: 48,
                    indicator: 44,
                    edge: EdgeDetect::Both,
                },
                LineBinding {
                    name: "player-2".into(),
                    switch: 49,
                    indicator: 26,
                    edge: EdgeDetect::Both,
                },
            ],
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would hand the same line to two roles.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_timeout_ms == 0 {
            return Err(AppError::Config(
                "poll_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.poll_timeout_ms > i32::MAX as u64 {
            return Err(AppError::Config(format!(
                "poll_timeout_ms must not exceed {}",
                i32::MAX
            )));
        }
        if self.bindings.is_empty() {
            return Err(AppError::Config("at least one binding is required".into()));
        }

        let mut seen = FxHashSet::default();
        for binding in &self.bindings {
            for line in [binding.switch, binding.indicator] {
                if !seen.insert(line) {
                    return Err(AppError::Config(format!(
                        "line {line} is used more than once (binding '{}')",
                        binding.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The two participants named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Players {
    pub first: String,
    pub second: String,
}

impl Players {
    /// Takes the arguments after the program name; extra arguments are ignored.
    pub fn from_args<I, S>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        match (args.next(), args.next()) {
            (Some(first), Some(second)) => Ok(Self { first, second }),
            _ => Err(AppError::Usage(format!(
                "{} <player1> <player2> [config.json]",
                env!("CARGO_PKG_NAME")
            ))),
        }
    }
}
