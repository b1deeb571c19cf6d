//! track_wrapper: preparing climate model output for the TRACK feature tracker
//!
//! TRACK is an external atmospheric feature-tracking program. This library
//! prepares CMIP6 and ERA5 sea-level pressure or wind files in the layout,
//! grid and naming TRACK expects, runs it one year at a time through its
//! `master` batch dispatcher, and converts the resulting tracks to NetCDF with
//! TR2NC. The numerical work is done entirely by TRACK, CDO and NCO.
//!
//! ## Pipeline
//!
//! raw file → [`inspector`] → [`preprocess`] → ([`vorticity`] for wind data)
//! → [`dispatch`] per year → [`postprocess`]
//!
//! ## Module Organization
//!
//! - [`inspector`]: NetCDF metadata queries (grid size and type, variables, years, timesteps)
//! - [`grid`]: Gaussian resolution ladder, spectral truncations, chunking constants
//! - [`roles`]: mapping of pressure and wind roles onto variable names
//! - [`template`]: control-file rendering for TRACK's stdin prompts
//! - [`process`]: external command abstraction with explicit cwd, env and timeouts
//! - [`preprocess`]: bound stripping, regridding and fill-value removal
//! - [`vorticity`]: 850 hPa vorticity derivation through TRACK
//! - [`dispatch`]: the year-by-year tracking loop and run summaries
//! - [`postprocess`]: TR2NC conversion of track files
//! - [`setup`]: staging support files into a TRACK installation
//! - [`config`]: toolchain configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use track_wrapper::prelude::*;
//! use std::path::Path;
//!
//! # async fn example() -> track_wrapper::errors::Result<()> {
//! let config = TrackConfig::default();
//! let runner = SystemRunner;
//! let tools = Toolchain::new(&runner, &config)?;
//!
//! let summary = track_dataset(
//!     &tools,
//!     Path::new("psl_day_MPI-ESM1-2-LR_historical.nc"),
//!     &tools.install().indat(),
//!     Path::new("tracks"),
//!     TrackOptions::default(),
//! )
//! .await?;
//! summary.print_summary();
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod grid;
pub mod inspector;
pub mod postprocess;
pub mod preprocess;
pub mod process;
pub mod roles;
pub mod setup;
pub mod template;
pub mod vorticity;

// Support modules
pub mod cli;
pub mod utils;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{TrackConfig, TrackInstall};
    pub use crate::dispatch::{
        run_tracking, track_dataset, track_wind_pair, RunSummary, TrackOptions, TrackRequest,
        YearJob, YearOutcome,
    };
    pub use crate::errors::{Result, TrackError};
    pub use crate::grid::{Hemisphere, ResolutionClass, SpectralTruncation};
    pub use crate::inspector::Dataset;
    pub use crate::postprocess::{convert_to_netcdf, TrackKind};
    pub use crate::preprocess::{merge_uv, preprocess};
    pub use crate::process::{CommandRunner, RecordingRunner, SystemRunner, Toolchain};
    pub use crate::roles::{Convention, FieldKind};
    pub use crate::setup::setup_files;
    pub use crate::vorticity::derive_vorticity;
}
