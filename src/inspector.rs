//! NetCDF dataset inspection
//!
//! Read-only queries of an input file: grid size, grid type, variable order,
//! years covered and number of timesteps. Grid type and years come from CDO,
//! the rest is read directly from the file. Nothing is cached; each call
//! reopens the file.

use crate::errors::{Result, TrackError};
use crate::grid::GridType;
use crate::process::Toolchain;
use netcdf::File;
use std::path::{Path, PathBuf};

const LON_NAMES: [&str; 2] = ["lon", "longitude"];
const LAT_NAMES: [&str; 2] = ["lat", "latitude"];

/// Handle on a NetCDF file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    path: PathBuf,
}

/// Everything the inspector knows about a file
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub nx: usize,
    pub ny: usize,
    pub grid_type: GridType,
    pub variables: Vec<String>,
    pub years: Vec<i32>,
    pub timesteps: usize,
}

impl DatasetSummary {
    /// Prints the summary in the same layout as the other reports.
    pub fn print(&self) {
        println!("\n Dataset: {}", self.path.display());
        println!("==============================");
        println!("    Grid: {} x {} ({})", self.nx, self.ny, self.grid_type);
        println!("    Variables: [{}]", self.variables.join(", "));
        println!(
            "    Years: {}",
            self.years
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        println!("    Timesteps: {}", self.timesteps);
    }
}

impl Dataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without the `.nc` extension
    pub fn stem(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.strip_suffix(".nc").unwrap_or(&name).to_string()
    }

    fn open(&self) -> Result<File> {
        Ok(netcdf::open(&self.path)?)
    }

    /// Number of longitudes and latitudes
    pub fn grid_dimensions(&self) -> Result<(usize, usize)> {
        let file = self.open()?;
        let nx = coordinate_length(&file, &LON_NAMES).ok_or_else(|| {
            TrackError::DataFormat(format!(
                "no longitude coordinate in {}",
                self.path.display()
            ))
        })?;
        let ny = coordinate_length(&file, &LAT_NAMES).ok_or_else(|| {
            TrackError::DataFormat(format!(
                "no latitude coordinate in {}",
                self.path.display()
            ))
        })?;
        Ok((nx, ny))
    }

    /// Variable names in the file's native order
    pub fn variable_names(&self) -> Result<Vec<String>> {
        let file = self.open()?;
        Ok(file.variables().map(|v| v.name().to_string()).collect())
    }

    /// Length of the time coordinate
    pub fn timestep_count(&self) -> Result<usize> {
        let file = self.open()?;
        coordinate_length(&file, &["time"]).ok_or_else(|| {
            TrackError::DataFormat(format!("no time coordinate in {}", self.path.display()))
        })
    }

    /// Grid type reported by `cdo griddes`
    pub async fn grid_type(&self, tools: &Toolchain<'_>) -> Result<GridType> {
        let output = tools.run(tools.cdo_griddes(&self.path)).await?;
        parse_grid_type(&output.stdout)
    }

    /// Years covered, in the order `cdo showyear` prints them, without duplicates
    pub async fn year_set(&self, tools: &Toolchain<'_>) -> Result<Vec<i32>> {
        let output = tools.run(tools.cdo_showyear(&self.path)).await?;
        parse_years(&output.stdout)
    }

    pub async fn summary(&self, tools: &Toolchain<'_>) -> Result<DatasetSummary> {
        let (nx, ny) = self.grid_dimensions()?;
        Ok(DatasetSummary {
            path: self.path.clone(),
            nx,
            ny,
            grid_type: self.grid_type(tools).await?,
            variables: self.variable_names()?,
            years: self.year_set(tools).await?,
            timesteps: self.timestep_count()?,
        })
    }
}

fn coordinate_length(file: &File, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        file.variable(name)
            .map(|var| var.dimensions().iter().map(|d| d.len()).product())
            .or_else(|| file.dimension(name).map(|d| d.len()))
    })
}

/// Extract the grid type from `cdo griddes` output.
pub fn parse_grid_type(griddes: &str) -> Result<GridType> {
    griddes
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == "gridtype").then(|| GridType::from_name(value.trim()))
        })
        .ok_or_else(|| TrackError::external("cdo", "griddes output has no gridtype line"))
}

/// Parse `cdo showyear` output, dropping repeats.
pub fn parse_years(showyear: &str) -> Result<Vec<i32>> {
    let mut years = Vec::new();
    for token in showyear.split_whitespace() {
        let year: i32 = token.parse().map_err(|_| {
            TrackError::external("cdo", format!("unexpected showyear token '{}'", token))
        })?;
        if !years.contains(&year) {
            years.push(year);
        }
    }
    if years.is_empty() {
        return Err(TrackError::external("cdo", "showyear printed no years"));
    }
    Ok(years)
}
