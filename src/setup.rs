//! Staging of support files into a TRACK installation
//!
//! Renders the RUNDATIN templates for the local machine and copies control
//! templates, initialisation profiles and TR2NC metadata into the installation.
//! Building TRACK or TR2NC is left to the user.

use crate::config::TrackInstall;
use crate::dispatch::RunDatIn;
use crate::errors::{Result, TrackError};
use crate::utils::copy_dir_files;
use log::info;
use std::fs;
use std::path::Path;

/// Token in RUNDATIN templates replaced by the directory holding the installation
pub const DIR_TOKEN: &str = "DIR";

/// What `setup_files` put where
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub rundatin_files: usize,
    pub control_files: usize,
    pub data_files: usize,
    pub meta_files: usize,
}

/// Stage the contents of `assets_dir` into `install`.
///
/// `assets_dir` holds `indat/template.<P>.in` for each RUNDATIN profile, and
/// optionally `trackdir/`, `data/` and `*.meta.elinor` TR2NC templates.
pub fn setup_files(install: &TrackInstall, assets_dir: &Path) -> Result<SetupReport> {
    if !assets_dir.is_dir() {
        return Err(TrackError::Precondition(format!(
            "asset directory {} does not exist",
            assets_dir.display()
        )));
    }
    let base = install
        .home()
        .parent()
        .unwrap_or(install.home())
        .display()
        .to_string();
    let mut report = SetupReport::default();

    fs::create_dir_all(install.indat())?;
    for profile in RunDatIn::ALL {
        let template = assets_dir
            .join("indat")
            .join(format!("template.{}.in", profile.suffix()));
        let contents = fs::read_to_string(&template).map_err(|e| {
            TrackError::Precondition(format!("cannot read {}: {}", template.display(), e))
        })?;
        fs::write(
            install.indat().join(profile.input_file()),
            contents.replace(DIR_TOKEN, &base),
        )?;
        report.rundatin_files += 1;
    }

    let trackdir = assets_dir.join("trackdir");
    if trackdir.is_dir() {
        report.control_files = copy_dir_files(&trackdir, install.home())?;
    }
    let data = assets_dir.join("data");
    if data.is_dir() {
        report.data_files = copy_dir_files(&data, &install.data())?;
    }

    for entry in fs::read_dir(assets_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.ends_with(".meta.elinor") {
            fs::create_dir_all(install.tr2nc_templates())?;
            fs::copy(entry.path(), install.tr2nc_templates().join(&name))?;
            report.meta_files += 1;
        }
    }

    info!(
        "Staged {} RUNDATIN, {} control, {} data and {} TR2NC metadata file(s) into {}",
        report.rundatin_files,
        report.control_files,
        report.data_files,
        report.meta_files,
        install.home().display()
    );
    Ok(report)
}
