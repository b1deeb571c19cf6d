//! Year-by-year dispatch of TRACK runs
//!
//! A cleaned dataset is cut into single-year slices. Each slice is optionally
//! turned into 850 hPa vorticity, spectrally filtered by TRACK and handed to
//! `master`, which splits the year into chunks of [`CHUNK_SPAN`] timesteps.
//! Years are processed in the order CDO reports them. Every temporary file is
//! tagged with its year, so with `jobs > 1` several years can be in flight
//! without sharing a file. A failing year is recorded in the [`RunSummary`]
//! and the remaining years still run.

use crate::errors::{Result, TrackError};
use crate::grid::{chunk_count, Hemisphere, SpectralTruncation, CHUNK_SPAN};
use crate::inspector::Dataset;
use crate::postprocess::{convert_to_netcdf, TrackKind};
use crate::preprocess::{merge_uv, preprocess};
use crate::process::{ExternalCommand, Toolchain};
use crate::roles::{resolve_roles, Convention, FieldKind};
use crate::template::{ControlTemplate, SPECFILT_DAT_TEMPLATE, SPECFILT_NC_TEMPLATE};
use crate::utils::{move_file, remove_best_effort};
use crate::vorticity::derive_vorticity;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Job definition file passed to `master -j`
pub const JOB_DEFINITION: &str = "RUN_AT.in";
/// Run prefix passed to `master -r`
pub const RUN_PREFIX: &str = "RUN_AT_";

/// RUNDATIN configuration selector for `master -s`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunDatIn {
    Mslp,
    MslpA,
    Vor,
    VorA,
}

impl RunDatIn {
    pub const ALL: [RunDatIn; 4] = [RunDatIn::Mslp, RunDatIn::MslpA, RunDatIn::Vor, RunDatIn::VorA];

    /// `_A` profiles use adaptive thresholds.
    pub fn select(field: FieldKind, adaptive: bool) -> Self {
        match (field, adaptive) {
            (FieldKind::Pressure, false) => RunDatIn::Mslp,
            (FieldKind::Pressure, true) => RunDatIn::MslpA,
            (FieldKind::Wind, false) => RunDatIn::Vor,
            (FieldKind::Wind, true) => RunDatIn::VorA,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            RunDatIn::Mslp => "MSLP",
            RunDatIn::MslpA => "MSLP_A",
            RunDatIn::Vor => "VOR",
            RunDatIn::VorA => "VOR_A",
        }
    }

    /// Selector as passed to `master`, e.g. `RUNDATIN.MSLP`
    pub fn selector(self) -> String {
        format!("RUNDATIN.{}", self.suffix())
    }

    /// File `master` reads from `indat/`
    pub fn input_file(self) -> String {
        format!("RUNDATIN.{}.in", self.suffix())
    }
}

/// Name of a `master` job and of its output directory.
///
/// Vorticity runs carry a `vor850_` infix so they never collide with a
/// pressure run on the same input.
pub fn job_name(year: i32, hemisphere: Hemisphere, label: &str, field: FieldKind) -> String {
    match field {
        FieldKind::Pressure => format!("{}_{}_{}", year, hemisphere, label),
        FieldKind::Wind => format!("{}_{}_vor850_{}", year, hemisphere, label),
    }
}

/// Settings shared by every year of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOptions {
    pub hemisphere: Hemisphere,
    pub produce_netcdf: bool,
    pub convention: Convention,
    pub adaptive: bool,
    pub allow_positional: bool,
    /// Field held by files without known variable names
    pub field: Option<FieldKind>,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            hemisphere: Hemisphere::NH,
            produce_netcdf: true,
            convention: Convention::Cmip6,
            adaptive: false,
            allow_positional: false,
            field: None,
        }
    }
}

/// A tracking run over a preprocessed file
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub cleaned: PathBuf,
    pub output_dir: PathBuf,
    /// Input name used in job names, normally the raw file's stem
    pub label: String,
    pub options: TrackOptions,
}

impl TrackRequest {
    pub fn new(cleaned: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let cleaned = cleaned.into();
        let label = Dataset::new(&cleaned).stem();
        Self {
            cleaned,
            output_dir: output_dir.into(),
            label,
            options: TrackOptions::default(),
        }
    }
}

/// Everything needed to track one year
#[derive(Debug, Clone, Serialize)]
pub struct YearJob {
    pub year: i32,
    pub hemisphere: Hemisphere,
    pub truncation: SpectralTruncation,
    pub timesteps: usize,
    pub chunk_count: usize,
    pub output_dir: PathBuf,
    pub year_file: PathBuf,
    /// Filter input, relative to `indat/`
    pub tracking_input: String,
    /// Filtered band file, relative to `indat/`
    pub filtered_file: String,
    pub job_name: String,
    pub rundatin: RunDatIn,
}

impl YearJob {
    /// Directory `master` writes this job's tracks to
    pub fn job_dir(&self) -> PathBuf {
        self.output_dir.join(&self.job_name)
    }

    pub fn master_command(&self, tools: &Toolchain<'_>) -> ExternalCommand {
        let executable = Path::new(&tools.config().track_binary)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tools.config().track_binary.clone());
        tools
            .master()
            .arg(format!("-c={}", self.job_name))
            .arg(format!("-e={}", executable))
            .arg("-d=now")
            .arg(format!("-i={}", self.filtered_file))
            .arg(format!("-f=y{}", self.year))
            .arg(format!("-j={}", JOB_DEFINITION))
            .arg(format!("-k={}", self.hemisphere.initial_profile(self.truncation)))
            .arg(format!("-n=1,{},{}", CHUNK_SPAN, self.chunk_count))
            .arg(format!("-o={}", self.output_dir.display()))
            .arg(format!("-r={}", RUN_PREFIX))
            .arg(format!("-s={}", self.rundatin.selector()))
    }
}

/// Result of one year
#[derive(Debug, Clone, Serialize)]
pub struct YearOutcome {
    pub year: i32,
    pub job: Option<YearJob>,
    pub netcdf_files: Vec<PathBuf>,
    pub error: Option<String>,
}

impl YearOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-year results of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub field: FieldKind,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub outcomes: Vec<YearOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> Vec<i32> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.year)
            .collect()
    }

    pub fn failed(&self) -> Vec<i32> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.year)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(YearOutcome::is_success)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("\n Tracking summary for {}", self.input.display());
        println!("==============================");
        for outcome in &self.outcomes {
            match &outcome.error {
                None => println!(
                    "   ✅ {}: {} NetCDF file(s)",
                    outcome.year,
                    outcome.netcdf_files.len()
                ),
                Some(e) => println!("   ❌ {}: {}", outcome.year, e),
            }
        }
        println!(
            "   {} succeeded, {} failed",
            self.succeeded().len(),
            self.failed().len()
        );
    }
}

/// The initialisation profile for the hemisphere and the RUNDATIN file must be
/// installed before anything runs.
fn check_profiles(
    tools: &Toolchain<'_>,
    hemisphere: Hemisphere,
    truncation: SpectralTruncation,
    rundatin: RunDatIn,
) -> Result<()> {
    let install = tools.install();
    let profile = hemisphere.initial_profile(truncation);
    if !install.data().join(&profile).is_file() && !install.indat().join(&profile).is_file() {
        return Err(TrackError::Precondition(format!(
            "{} tracking at {} needs {} in {} or {}",
            hemisphere,
            truncation,
            profile,
            install.data().display(),
            install.indat().display()
        )));
    }
    let rundatin_file = install.indat().join(rundatin.input_file());
    if !rundatin_file.is_file() {
        return Err(TrackError::Precondition(format!(
            "{} is missing; run setup first",
            rundatin_file.display()
        )));
    }
    Ok(())
}

struct YearContext<'t, 'a> {
    tools: &'t Toolchain<'a>,
    request: &'t TrackRequest,
    field: FieldKind,
    nx: usize,
    ny: usize,
    truncation: SpectralTruncation,
    rundatin: RunDatIn,
    filter_template: ControlTemplate,
    output_dir: PathBuf,
}

impl YearContext<'_, '_> {
    async fn run_year(&self, year: i32) -> YearOutcome {
        info!("{}...", year);
        let mut job = None;
        let result = self.track_year(year, &mut job).await;
        match result {
            Ok(netcdf_files) => YearOutcome {
                year,
                job,
                netcdf_files,
                error: None,
            },
            Err(e) => {
                warn!("Year {} failed: {}", year, e);
                YearOutcome {
                    year,
                    job,
                    netcdf_files: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn track_year(&self, year: i32, job_slot: &mut Option<YearJob>) -> Result<Vec<PathBuf>> {
        let tools = self.tools;
        let year_file = tools.install().indat().join(format!("tempyear_{}.nc", year));
        let selected = tools
            .run(tools.cdo_selyear(year, &self.request.cleaned, &year_file))
            .await;
        let result = match selected {
            Ok(_) => self.track_slice(year, &year_file, job_slot).await,
            Err(e) => Err(e),
        };
        remove_best_effort(&year_file);
        let job = result?;

        if !self.request.options.produce_netcdf {
            return Ok(Vec::new());
        }
        info!("Turning track output to NetCDF...");
        let kind = match self.field {
            FieldKind::Pressure => TrackKind::PressureTracks,
            FieldKind::Wind => TrackKind::VorticityTracks,
        };
        let mut converted = Vec::new();
        for file in kind.populated() {
            let ascii = job.job_dir().join(file.file_name());
            converted.push(convert_to_netcdf(tools, &ascii, kind).await?);
        }
        Ok(converted)
    }

    async fn track_slice(
        &self,
        year: i32,
        year_file: &Path,
        job_slot: &mut Option<YearJob>,
    ) -> Result<YearJob> {
        let tools = self.tools;
        let options = &self.request.options;
        let timesteps = Dataset::new(year_file).timestep_count()?;

        let (tracking_input, derived) = match self.field {
            FieldKind::Pressure => (file_name(year_file), None),
            FieldKind::Wind => {
                let name = format!("vor850_{}.dat", year);
                let path = derive_vorticity(
                    tools,
                    year_file,
                    &name,
                    options.convention,
                    options.allow_positional,
                )
                .await?;
                (name, Some(path))
            }
        };

        let job = YearJob {
            year,
            hemisphere: options.hemisphere,
            truncation: self.truncation,
            timesteps,
            chunk_count: chunk_count(timesteps),
            output_dir: self.output_dir.clone(),
            year_file: year_file.to_path_buf(),
            tracking_input,
            filtered_file: self.truncation.filtered_file_name(year),
            job_name: job_name(year, options.hemisphere, &self.request.label, self.field),
            rundatin: self.rundatin,
        };
        *job_slot = Some(job.clone());

        let result = self.filter_and_track(&job).await;
        if let Some(path) = &derived {
            remove_best_effort(path);
        }
        result.map(|_| job)
    }

    async fn filter_and_track(&self, job: &YearJob) -> Result<()> {
        let tools = self.tools;
        let install = tools.install();

        info!("Spectral filtering at {}...", job.truncation);
        let control = self.filter_template.render_to(
            &install.home().join(format!("spec_{}.test", job.year)),
            &[
                ("NX", self.nx.to_string()),
                ("NY", self.ny.to_string()),
                ("TRUNC", job.truncation.wave_number().to_string()),
            ],
        )?;
        let filtered = tools
            .run(tools.track(&job.tracking_input, job.year, &control))
            .await;
        remove_best_effort(&control);
        filtered?;

        let band = install.outdat().join(format!("specfil.y{}_band001", job.year));
        if !band.exists() {
            return Err(TrackError::MissingOutput { path: band });
        }
        move_file(&band, &install.indat().join(&job.filtered_file))?;
        remove_best_effort(&install.outdat().join(format!("specfil.y{}_band000", job.year)));

        info!(
            "Running TRACK job {} ({} timesteps, {} chunk(s))...",
            job.job_name, job.timesteps, job.chunk_count
        );
        tools.run(job.master_command(tools)).await?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Track every year of a preprocessed dataset.
///
/// Problems that affect the whole run (missing installation files,
/// unrecognised variables, unreadable grid) are returned as errors. Failures of
/// individual years are reported in the summary instead.
pub async fn run_tracking(tools: &Toolchain<'_>, request: &TrackRequest) -> Result<RunSummary> {
    let started = Utc::now();
    let options = &request.options;

    let dataset = Dataset::new(&request.cleaned);
    let roles = resolve_roles(
        &dataset.variable_names()?,
        options.convention,
        options.allow_positional,
        options.field,
    )?;
    let field = roles.field();
    let (nx, ny) = dataset.grid_dimensions()?;
    let truncation = SpectralTruncation::for_latitudes(ny);
    let rundatin = RunDatIn::select(field, options.adaptive);
    check_profiles(tools, options.hemisphere, truncation, rundatin)?;

    let template_name = match field {
        FieldKind::Pressure => SPECFILT_NC_TEMPLATE,
        FieldKind::Wind => SPECFILT_DAT_TEMPLATE,
    };
    let filter_template = ControlTemplate::load(&tools.install().home().join(template_name))?;

    fs::create_dir_all(&request.output_dir)?;
    let output_dir = fs::canonicalize(&request.output_dir)?;

    let years = dataset.year_set(tools).await?;
    let jobs = tools.config().effective_jobs().max(1);
    info!(
        "Tracking {:?} field of {} ({}x{}, {}) for {} year(s), {} at a time",
        field,
        request.cleaned.display(),
        nx,
        ny,
        truncation,
        years.len(),
        jobs
    );

    let context = YearContext {
        tools,
        request,
        field,
        nx,
        ny,
        truncation,
        rundatin,
        filter_template,
        output_dir,
    };
    let outcomes: Vec<YearOutcome> = stream::iter(years)
        .map(|year| context.run_year(year))
        .buffered(jobs)
        .collect()
        .await;

    Ok(RunSummary {
        input: request.cleaned.clone(),
        field,
        started,
        finished: Utc::now(),
        outcomes,
    })
}

/// Preprocess `input` into `work_dir`, track it, and remove the cleaned file.
pub async fn track_dataset(
    tools: &Toolchain<'_>,
    input: &Path,
    work_dir: &Path,
    output_dir: &Path,
    options: TrackOptions,
) -> Result<RunSummary> {
    let label = Dataset::new(input).stem();
    track_labelled(tools, input, &label, work_dir, output_dir, options).await
}

/// Merge separate u and v files, then track the merged winds.
///
/// Jobs are labelled by the stem of `file1`, as for a single-file run. The
/// merged file is removed afterwards.
pub async fn track_wind_pair(
    tools: &Toolchain<'_>,
    file1: &Path,
    file2: &Path,
    work_dir: &Path,
    output_dir: &Path,
    options: TrackOptions,
) -> Result<RunSummary> {
    let label = Dataset::new(file1).stem();
    fs::create_dir_all(work_dir)?;
    let merged = work_dir.join(format!("{}_merged.nc", label));
    merge_uv(tools, file1, file2, &merged).await?;

    let summary = track_labelled(tools, &merged, &label, work_dir, output_dir, options).await;
    remove_best_effort(&merged);
    let mut summary = summary?;
    summary.input = file1.to_path_buf();
    Ok(summary)
}

async fn track_labelled(
    tools: &Toolchain<'_>,
    input: &Path,
    label: &str,
    work_dir: &Path,
    output_dir: &Path,
    options: TrackOptions,
) -> Result<RunSummary> {
    let cleaned = preprocess(
        tools,
        input,
        work_dir,
        options.convention,
        options.allow_positional,
        options.field,
    )
    .await?;

    let request = TrackRequest {
        cleaned: cleaned.clone(),
        output_dir: output_dir.to_path_buf(),
        label: label.to_string(),
        options,
    };
    let summary = run_tracking(tools, &request).await;
    remove_best_effort(&cleaned);
    let mut summary = summary?;
    summary.input = input.to_path_buf();
    Ok(summary)
}
