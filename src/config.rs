//! Configuration of the external toolchain
//!
//! Defaults reproduce a stock TRACK-1.5.2 installation in the user's home
//! directory. A JSON file can override any field; command-line flags override
//! the file.

use crate::errors::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

/// Directory name of the TRACK installation below `$HOME`.
pub const TRACK_DIR_NAME: &str = "TRACK-1.5.2";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub track_home: PathBuf,
    /// Relative to `track_home`
    pub track_binary: String,
    pub master_binary: String,
    /// Relative to `track_home`
    pub tr2nc_dir: String,
    pub tr2nc_binary: String,
    pub cdo: String,
    pub ncks: String,
    pub ncatted: String,
    pub tool_timeout_secs: u64,
    pub track_timeout_secs: u64,
    /// Compiler identities and flags TRACK's scripts expect
    pub compiler_env: BTreeMap<String, String>,
    /// Append `.` to `PATH` so `master` finds TRACK's helper scripts
    pub append_cwd_to_path: bool,
    /// Concurrent year jobs, 0 means one per CPU core
    pub jobs: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        let mut compiler_env = BTreeMap::new();
        compiler_env.insert("CC".to_string(), "gcc".to_string());
        compiler_env.insert("FC".to_string(), "gfortran".to_string());
        compiler_env.insert("ARFLAGS".to_string(), String::new());

        Self {
            track_home: default_track_home(),
            track_binary: "bin/track.linux".to_string(),
            master_binary: "master".to_string(),
            tr2nc_dir: "utils/bin".to_string(),
            tr2nc_binary: "tr2nc".to_string(),
            cdo: "cdo".to_string(),
            ncks: "ncks".to_string(),
            ncatted: "ncatted".to_string(),
            tool_timeout_secs: 3600,
            track_timeout_secs: 86400,
            compiler_env,
            append_cwd_to_path: true,
            jobs: 1,
        }
    }
}

fn default_track_home() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TRACK_DIR_NAME)
}

impl TrackConfig {
    /// Load a JSON configuration file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: TrackConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn track_timeout(&self) -> Duration {
        Duration::from_secs(self.track_timeout_secs)
    }

    /// Effective number of concurrent year jobs.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// Environment handed to TRACK and `master`.
    pub fn track_env(&self) -> Vec<(String, OsString)> {
        let mut vars: Vec<(String, OsString)> = self
            .compiler_env
            .iter()
            .map(|(k, v)| (k.clone(), OsString::from(v)))
            .collect();

        if self.append_cwd_to_path {
            let mut path = env::var_os("PATH").unwrap_or_default();
            if !path.is_empty() {
                path.push(":");
            }
            path.push(".");
            vars.push(("PATH".to_string(), path));
        }
        vars
    }

    /// Check the installation exists and return its layout.
    pub fn install(&self) -> Result<TrackInstall> {
        TrackInstall::locate(&self.track_home)
    }
}

/// Layout of an existing TRACK installation
#[derive(Debug, Clone)]
pub struct TrackInstall {
    home: PathBuf,
}

impl TrackInstall {
    pub fn locate(home: &Path) -> Result<Self> {
        if !home.is_dir() {
            return Err(TrackError::Precondition(format!(
                "TRACK installation not found at {}",
                home.display()
            )));
        }
        Ok(Self {
            home: home.to_path_buf(),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Input directory TRACK reads `-i` files from
    pub fn indat(&self) -> PathBuf {
        self.home.join("indat")
    }

    pub fn outdat(&self) -> PathBuf {
        self.home.join("outdat")
    }

    pub fn data(&self) -> PathBuf {
        self.home.join("data")
    }

    pub fn tr2nc_templates(&self) -> PathBuf {
        self.home.join("utils").join("TR2NC")
    }
}
