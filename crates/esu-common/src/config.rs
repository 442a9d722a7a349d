//! ---
//! esu_section: "01-shared-foundation"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Shared primitives and utilities for the trial harness."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_program() -> PathBuf {
    PathBuf::from("./OpenRA.Game")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("..")
}

fn default_launch_params() -> IndexMap<String, String> {
    let mut params = IndexMap::new();
    params.insert("Launch.Ai".to_owned(), "ESU AI".to_owned());
    params.insert("Launch.MapName".to_owned(), "Forest Path".to_owned());
    params.insert("Launch.AiSpawnPoint".to_owned(), "0".to_owned());
    params.insert("Launch.AiFaction".to_owned(), "russia".to_owned());
    params
}

fn default_prepend_key() -> String {
    "Launch.LogPrepend".to_owned()
}

/// The engine writes its logs under `<Documents>/OpenRA/Logs`.
fn default_artifact_root() -> PathBuf {
    let home = std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Documents").join("OpenRA").join("Logs")
}

fn default_artifact_suffix() -> String {
    "end_game_fitness.log".to_owned()
}

fn default_marker() -> String {
    "WIN".to_owned()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_parallel() -> usize {
    20
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("output/diagnostics")
}

/// Primary configuration object for a harness run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub launch: LaunchConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`HarnessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHarnessConfig {
    pub config: HarnessConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl HarnessConfig {
    pub const ENV_CONFIG_PATH: &'static str = "ESU_TRIALS_CONFIG";
    pub const DEFAULT_CONFIG_PATH: &'static str = "configs/esu-trials.toml";

    /// Load configuration, respecting the `ESU_TRIALS_CONFIG` override and
    /// falling back to built-in defaults when no candidate exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHarnessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(LoadedHarnessConfig {
            config,
            source: None,
        })
    }

    /// Read and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<HarnessConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.launch.validate()?;
        self.artifacts.validate()?;
        if self.scheduler.max_parallel == 0 {
            return Err(anyhow!("scheduler.max_parallel must be at least 1"));
        }
        if self.scheduler.trial_timeout == Some(Duration::ZERO) {
            return Err(anyhow!("scheduler.trial_timeout_secs must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// How the external simulation process is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Arguments placed before the `key=value` launch parameters.
    #[serde(default)]
    pub leading_args: Vec<String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Fixed launch parameters, passed in declaration order.
    #[serde(default = "default_launch_params")]
    pub params: IndexMap<String, String>,
    /// Parameter carrying the per-trial log tag.
    #[serde(default = "default_prepend_key")]
    pub prepend_key: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            leading_args: Vec::new(),
            working_dir: default_working_dir(),
            params: default_launch_params(),
            prepend_key: default_prepend_key(),
        }
    }
}

impl LaunchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.program.as_os_str().is_empty() {
            return Err(anyhow!("launch.program must not be empty"));
        }
        if self.prepend_key.trim().is_empty() {
            return Err(anyhow!("launch.prepend_key must not be empty"));
        }
        if self.params.contains_key(&self.prepend_key) {
            return Err(anyhow!(
                "launch.params must not set '{}'; it is assigned per trial",
                self.prepend_key
            ));
        }
        Ok(())
    }
}

/// Where trial artifacts are found and how they are judged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,
    /// File name appended to `<tag>_`.
    #[serde(default = "default_artifact_suffix")]
    pub suffix: String,
    /// Case-sensitive substring denoting a definitive win.
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: default_artifact_root(),
            suffix: default_artifact_suffix(),
            marker: default_marker(),
        }
    }
}

impl ArtifactConfig {
    pub fn validate(&self) -> Result<()> {
        if self.marker.is_empty() {
            return Err(anyhow!("artifacts.marker must not be empty"));
        }
        if self.suffix.is_empty() {
            return Err(anyhow!("artifacts.suffix must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(
        default,
        rename = "trial_timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub trial_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            trial_timeout: None,
        }
    }
}

/// Diagnostic tracing settings. The human-readable run log is configured
/// through [`OutputConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Also write diagnostics to a daily rolling file under `directory`.
    #[serde(default)]
    pub write_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: LogFormat::default(),
            file_prefix: None,
            write_file: false,
        }
    }
}
