//! Conversion of TRACK's ASCII track files to NetCDF with TR2NC
//!
//! `master` leaves gzip-compressed track files in each job directory. They are
//! decompressed in-process and handed to `tr2nc` together with the metadata
//! template matching the tracked field.

use crate::errors::{Result, TrackError};
use crate::process::Toolchain;
use flate2::read::GzDecoder;
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Which TR2NC metadata template applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    PressureTracks,
    VorticityTracks,
}

impl TrackKind {
    /// Metadata file under `utils/TR2NC`
    pub fn meta_template(self) -> &'static str {
        match self {
            TrackKind::PressureTracks => "tr2nc_mslp.meta.elinor",
            TrackKind::VorticityTracks => "tr2nc.meta.elinor",
        }
    }

    /// Track files `master` fills for this kind of run. Pressure minima only
    /// give negative-orientation tracks.
    pub fn populated(self) -> &'static [TrackFile] {
        match self {
            TrackKind::PressureTracks => &[TrackFile::FfTrsNeg, TrackFile::TrTrsNeg],
            TrackKind::VorticityTracks => &[
                TrackFile::FfTrsPos,
                TrackFile::FfTrsNeg,
                TrackFile::TrTrsPos,
                TrackFile::TrTrsNeg,
            ],
        }
    }
}

/// Standard per-job output files of `master`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFile {
    FfTrsPos,
    FfTrsNeg,
    TrTrsPos,
    TrTrsNeg,
}

impl TrackFile {
    pub fn file_name(self) -> &'static str {
        match self {
            TrackFile::FfTrsPos => "ff_trs_pos",
            TrackFile::FfTrsNeg => "ff_trs_neg",
            TrackFile::TrTrsPos => "tr_trs_pos",
            TrackFile::TrTrsNeg => "tr_trs_neg",
        }
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Make sure the uncompressed `path` exists.
///
/// A present `<path>.gz` is unpacked over `path` and removed. An already
/// unpacked file is left alone.
pub fn decompress(path: &Path) -> Result<()> {
    let compressed = gz_path(path);
    if compressed.exists() {
        let mut decoder = GzDecoder::new(BufReader::new(File::open(&compressed)?));
        let mut out = BufWriter::new(File::create(path)?);
        io::copy(&mut decoder, &mut out)?;
        drop(out);
        fs::remove_file(&compressed)?;
        Ok(())
    } else if path.exists() {
        Ok(())
    } else {
        Err(TrackError::MissingOutput {
            path: path.to_path_buf(),
        })
    }
}

/// Convert one ASCII track file, returning the NetCDF file TR2NC writes next to it.
pub async fn convert_to_netcdf(
    tools: &Toolchain<'_>,
    ascii_track_path: &Path,
    kind: TrackKind,
) -> Result<PathBuf> {
    decompress(ascii_track_path)?;
    let full_path = fs::canonicalize(ascii_track_path)?;
    tools
        .run(tools.tr2nc(&full_path, kind.meta_template()))
        .await?;

    let mut output = full_path.into_os_string();
    output.push(".nc");
    let output = PathBuf::from(output);
    info!("Converted {} to NetCDF", ascii_track_path.display());
    Ok(output)
}
