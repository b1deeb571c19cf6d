//! Entry point for the track_wrapper application.
//! Handles CLI parsing and logging setup, and dispatches to the pipeline stages.

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::Path;
use track_wrapper::cli::{Args, Command};
use track_wrapper::prelude::*;
use track_wrapper::{config::TrackInstall, inspector::Dataset};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::new().filter_or("TRACK_WRAPPER_LOG", default_level))
        .format_timestamp_millis()
        .init();

    match run(args).await {
        Ok(true) => info!("Finished. Check the output directory and log."),
        Ok(false) => {
            error!("Some years failed, see the summary above.");
            std::process::exit(2);
        }
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Args) -> Result<TrackConfig> {
    let mut config = match &args.config {
        Some(path) => TrackConfig::load(path)?,
        None => TrackConfig::default(),
    };
    if let Some(home) = &args.track_home {
        config.track_home = home.clone();
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(timeout) = args.timeout {
        config.track_timeout_secs = timeout;
    }
    Ok(config)
}

/// Returns whether every tracked year succeeded.
async fn run(args: Args) -> Result<bool> {
    let config = load_config(&args)?;
    let runner = SystemRunner;

    match args.command {
        Command::Inspect { file } => {
            // CDO does not need TRACK, so inspection works without an installation
            let install = config
                .install()
                .or_else(|_| TrackInstall::locate(Path::new(".")))?;
            let tools = Toolchain::with_install(&runner, &config, install);
            Dataset::new(file).summary(&tools).await?.print();
        }
        Command::Preprocess {
            file,
            work_dir,
            data,
        } => {
            let tools = Toolchain::new(&runner, &config)?;
            let work_dir = work_dir.unwrap_or_else(|| tools.install().indat());
            let cleaned = preprocess(
                &tools,
                &file,
                &work_dir,
                data.convention,
                data.positional_roles,
                data.field,
            )
            .await?;
            println!("✅ Saved cleaned file to {}", cleaned.display());
        }
        Command::MergeUv {
            file1,
            file2,
            output,
        } => {
            let tools = Toolchain::new(&runner, &config)?;
            merge_uv(&tools, &file1, &file2, &output).await?;
        }
        Command::Vorticity {
            file,
            basename,
            data,
        } => {
            let tools = Toolchain::new(&runner, &config)?;
            let output = derive_vorticity(
                &tools,
                &file,
                &basename,
                data.convention,
                data.positional_roles,
            )
            .await?;
            println!("✅ Saved vorticity to {}", output.display());
        }
        Command::Track {
            file,
            output_dir,
            second_file,
            hemisphere,
            no_netcdf,
            adaptive,
            work_dir,
            summary,
            data,
        } => {
            let tools = Toolchain::new(&runner, &config)?;
            let work_dir = work_dir.unwrap_or_else(|| tools.install().indat());
            let options = TrackOptions {
                hemisphere,
                produce_netcdf: !no_netcdf,
                convention: data.convention,
                adaptive,
                allow_positional: data.positional_roles,
                field: data.field,
            };

            let run_summary = match second_file {
                Some(second) => {
                    track_wind_pair(&tools, &file, &second, &work_dir, &output_dir, options).await?
                }
                None => track_dataset(&tools, &file, &work_dir, &output_dir, options).await?,
            };

            run_summary.print_summary();
            if let Some(path) = summary {
                run_summary.write_json(&path)?;
                println!("✅ Saved run summary to {}", path.display());
            }
            return Ok(run_summary.is_success());
        }
        Command::Convert { file, kind } => {
            let tools = Toolchain::new(&runner, &config)?;
            let output = convert_to_netcdf(&tools, &file, kind.into()).await?;
            println!("✅ Saved tracks to {}", output.display());
        }
        Command::Setup { assets_dir } => {
            let install = config.install()?;
            setup_files(&install, &assets_dir)?;
        }
    }

    Ok(true)
}
