//! Supervisor configuration: defaults, `config.json` persistence and
//! `GRAPHTRACE_*` environment overrides.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;
use crate::recording::RecordingConfig;
use crate::recording::area::write_atomic;
use crate::script::DEFAULT_MAX_CALL_DEPTH;

/// Worker binary name.
pub const WORKER_BINARY: &str = "graphtrace-worker";

/// OS resource limits applied inside the worker before running code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerLimits {
    /// CPU time limit in seconds (`RLIMIT_CPU`).
    pub cpu_seconds: Option<u64>,
    /// Address space limit in bytes (`RLIMIT_AS`).
    pub memory_bytes: Option<u64>,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            cpu_seconds: Some(30),
            memory_bytes: Some(1 << 30),
        }
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Worker executable; resolved next to the current executable when unset.
    pub worker_program: Option<PathBuf>,
    /// Default wall-clock budget per submission, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of concurrently running workers.
    pub max_workers: usize,
    /// Recording area settings, forwarded to every worker.
    pub recording: RecordingConfig,
    /// Cap on nested script function calls.
    pub max_call_depth: usize,
    /// OS resource limits for workers.
    pub limits: WorkerLimits,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_program: None,
            timeout_ms: 10_000,
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            recording: RecordingConfig::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            limits: WorkerLimits::default(),
        }
    }
}

impl SupervisorConfig {
    /// Default timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load from `path` when it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write configuration atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        write_atomic(path, &json).with_context(|| format!("Failed to write config: {:?}", path))
    }

    /// Apply `GRAPHTRACE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; unrelated names are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            match name.as_str() {
                "GRAPHTRACE_WORKER" => self.worker_program = Some(PathBuf::from(value)),
                "GRAPHTRACE_TIMEOUT_MS" => self.timeout_ms = parse_var(&name, &value)?,
                "GRAPHTRACE_MAX_WORKERS" => self.max_workers = parse_var(&name, &value)?,
                "GRAPHTRACE_RECORDING_ROOT" => self.recording.root = PathBuf::from(value),
                "GRAPHTRACE_AUTO_DELETE" => self.recording.auto_delete = parse_var(&name, &value)?,
                "GRAPHTRACE_MAX_RECORDS" => self.recording.max_records = parse_var(&name, &value)?,
                "GRAPHTRACE_MAX_CALL_DEPTH" => self.max_call_depth = parse_var(&name, &value)?,
                _ => {}
            }
        }
        self.validate()?;
        Ok(())
    }

    /// Reject settings the supervisor cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Resolve the worker executable.
    pub fn resolve_worker_program(&self) -> Result<PathBuf> {
        if let Some(program) = &self.worker_program {
            return Ok(program.clone());
        }
        let exe = std::env::current_exe().context("Failed to locate current executable")?;
        let file_name = format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX);
        let mut dir = exe.parent();
        while let Some(candidate) = dir {
            let path = candidate.join(&file_name);
            if path.is_file() {
                return Ok(path);
            }
            if candidate.file_name().is_some_and(|name| name == "deps") {
                dir = candidate.parent();
            } else {
                break;
            }
        }
        bail!("cannot find {} next to {:?}", file_name, exe)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid value {:?} for {}: {}", value, name, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::Supervisor;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = SupervisorConfig::default();
        config.timeout_ms = 2_500;
        config.recording.auto_delete = false;
        config.write(&path).unwrap();
        assert_eq!(SupervisorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: SupervisorConfig = serde_json::from_str(r#"{"timeout_ms": 1}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(1));
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn environment_overrides_apply_and_validate() {
        let mut config = SupervisorConfig::default();
        config
            .apply_overrides([
                ("GRAPHTRACE_TIMEOUT_MS".to_string(), "750".to_string()),
                ("GRAPHTRACE_AUTO_DELETE".to_string(), "false".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.timeout_ms, 750);
        assert!(!config.recording.auto_delete);

        assert!(config
            .apply_overrides([("GRAPHTRACE_MAX_WORKERS".to_string(), "0".to_string())])
            .is_err());
        assert!(config
            .apply_overrides([("GRAPHTRACE_TIMEOUT_MS".to_string(), "soon".to_string())])
            .is_err());
    }

    #[test]
    fn invalid_settings_are_configuration_errors() {
        let config = SupervisorConfig {
            max_workers: 0,
            ..SupervisorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Unknown);
        assert_eq!(
            err.to_string(),
            "Configuration error: max_workers must be at least 1"
        );

        let config = SupervisorConfig {
            timeout_ms: 0,
            ..SupervisorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(Supervisor::new(config).is_err());
        assert!(SupervisorConfig::default().validate().is_ok());
    }
}
