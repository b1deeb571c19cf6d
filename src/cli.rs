//! Defines command-line interface options using `clap` for the track_wrapper application.

use crate::grid::Hemisphere;
use crate::postprocess::TrackKind;
use crate::roles::{Convention, FieldKind};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// A CLI tool for running TRACK on CMIP6 and ERA5 data
#[derive(Parser, Debug)]
#[command(
    version,
    name = "track_wrapper",
    about = "Prepare CMIP6/ERA5 NetCDF data for TRACK and run it one year at a time"
)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// TRACK installation directory. Defaults to ~/TRACK-1.5.2
    #[arg(long, global = true)]
    pub track_home: Option<PathBuf>,

    /// Number of years tracked concurrently, 0 for one per CPU core
    #[arg(short = 'j', long, global = true)]
    pub jobs: Option<usize>,

    /// Time limit in seconds for each TRACK and master invocation
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print grid, variables, years and timesteps of a NetCDF file
    Inspect {
        /// Path to the NetCDF file
        file: PathBuf,
    },

    /// Strip bounds, regrid to a Gaussian grid and remove fill values
    Preprocess {
        file: PathBuf,

        /// Directory for the cleaned file. Defaults to TRACK's indat directory
        #[arg(long)]
        work_dir: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Merge separate CMIP6 ua and va files
    MergeUv {
        file1: PathBuf,
        file2: PathBuf,
        output: PathBuf,
    },

    /// Compute 850 hPa vorticity from a single-year u/v file
    Vorticity {
        file: PathBuf,

        /// Bare .dat file name written to TRACK's indat directory
        basename: String,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Preprocess a file and track every year in it
    Track {
        file: PathBuf,

        /// Directory TRACK writes the tracks to
        output_dir: PathBuf,

        /// Second wind component file, when ua and va are separate
        #[arg(long)]
        second_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Hemisphere::NH)]
        hemisphere: Hemisphere,

        /// Keep TRACK's ASCII output only
        #[arg(long, default_value_t = false)]
        no_netcdf: bool,

        /// Use the adaptive-threshold RUNDATIN profiles
        #[arg(long, default_value_t = false)]
        adaptive: bool,

        /// Directory for intermediate files. Defaults to TRACK's indat directory
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Write the per-year outcome as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Convert one TRACK ASCII track file to NetCDF
    Convert {
        file: PathBuf,

        #[arg(long, value_enum)]
        kind: KindArg,
    },

    /// Stage RUNDATIN files, control templates and profiles into TRACK
    Setup {
        /// Directory with indat/, trackdir/, data/ and *.meta.elinor files
        assets_dir: PathBuf,
    },
}

/// Options describing the input data
#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct DataArgs {
    /// Naming convention of the input
    #[arg(long, value_enum, default_value_t = Convention::Cmip6)]
    pub convention: Convention,

    /// Fall back to variable position when no known variable name is found
    #[arg(long, default_value_t = false, requires = "field")]
    pub positional_roles: bool,

    /// Field the file holds, required by --positional-roles
    #[arg(long, value_enum)]
    pub field: Option<FieldKind>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Mslp,
    Vor,
}

impl From<KindArg> for TrackKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Mslp => TrackKind::PressureTracks,
            KindArg::Vor => TrackKind::VorticityTracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_track_command() {
        let args = Args::parse_from([
            "track_wrapper",
            "--jobs",
            "2",
            "track",
            "psl.nc",
            "out",
            "--hemisphere",
            "SH",
            "--convention",
            "era5",
            "--no-netcdf",
        ]);
        assert_eq!(args.jobs, Some(2));
        match args.command {
            Command::Track {
                hemisphere,
                no_netcdf,
                data,
                ..
            } => {
                assert_eq!(hemisphere, Hemisphere::SH);
                assert!(no_netcdf);
                assert_eq!(data.convention, Convention::Era5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn positional_roles_require_a_field() {
        let args = [
            "track_wrapper",
            "track",
            "uv.nc",
            "out",
            "--positional-roles",
        ];
        assert!(Args::try_parse_from(args).is_err());

        let args = Args::parse_from([
            "track_wrapper",
            "track",
            "uv.nc",
            "out",
            "--positional-roles",
            "--field",
            "wind",
        ]);
        match args.command {
            Command::Track { data, .. } => {
                assert!(data.positional_roles);
                assert_eq!(data.field, Some(FieldKind::Wind));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
