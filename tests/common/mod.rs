//! Shared fixtures: NetCDF test files, a fake TRACK installation and a fake
//! toolchain that imitates what CDO, NCO, TRACK, master and tr2nc leave on disk.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use netcdf::create;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use track_wrapper::errors::Result;
use track_wrapper::process::{CommandOutput, ExternalCommand};
use track_wrapper::prelude::TrackConfig;

/// Write a NetCDF file whose variables appear in `variables` order.
///
/// `time`, `lat` and `lon` become coordinates, `*_bnds` get a `bnds` dimension,
/// anything else is a `(time, lat, lon)` field.
pub fn write_dataset(
    path: &Path,
    nx: usize,
    ny: usize,
    timesteps: usize,
    variables: &[&str],
) -> netcdf::Result<()> {
    if path.exists() {
        fs::remove_file(path).expect("Failed to replace fixture");
    }
    let mut file = create(path)?;
    file.add_dimension("time", timesteps)?;
    file.add_dimension("lat", ny)?;
    file.add_dimension("lon", nx)?;
    file.add_dimension("bnds", 2)?;

    for name in variables {
        match *name {
            "time" => {
                let mut var = file.add_variable::<f64>("time", &["time"])?;
                let values: Vec<f64> = (0..timesteps).map(|t| t as f64 * 0.25).collect();
                var.put_values(&values, ..)?;
            }
            "lat" => {
                let mut var = file.add_variable::<f64>("lat", &["lat"])?;
                let step = 180.0 / ny as f64;
                let values: Vec<f64> = (0..ny).map(|j| -90.0 + step * (j as f64 + 0.5)).collect();
                var.put_values(&values, ..)?;
            }
            "lon" => {
                let mut var = file.add_variable::<f64>("lon", &["lon"])?;
                let step = 360.0 / nx as f64;
                let values: Vec<f64> = (0..nx).map(|i| step * i as f64).collect();
                var.put_values(&values, ..)?;
            }
            bounds if bounds.ends_with("_bnds") => {
                let coord = bounds.trim_end_matches("_bnds");
                file.add_variable::<f64>(bounds, &[coord, "bnds"])?;
            }
            field => {
                let mut var = file.add_variable::<f32>(field, &["time", "lat", "lon"])?;
                var.put_attribute("_FillValue", 1.0e20f32)?;
            }
        }
    }
    Ok(())
}

/// Create a TRACK installation skeleton under `root` with the given
/// initialisation profiles, e.g. `["initial.T63_NH"]`.
pub fn fake_track_home(root: &Path, profiles: &[&str]) -> PathBuf {
    let home = root.join("TRACK-1.5.2");
    for dir in ["indat", "outdat", "data", "utils/bin", "utils/TR2NC", "bin"] {
        fs::create_dir_all(home.join(dir)).expect("Failed to create TRACK directory");
    }
    fs::write(home.join("calcvor.in"), "VAR1\nVAR2\nNX\nNY\nLEV\nVOR\n").unwrap();
    fs::write(home.join("specfilt_nc.in"), "nc\nNX\nNY\nTRUNC\n").unwrap();
    fs::write(home.join("specfilt.in"), "dat\nNX\nNY\nTRUNC\n").unwrap();
    for profile in profiles {
        fs::write(home.join("data").join(profile), "profile\n").unwrap();
    }
    for suffix in ["MSLP", "MSLP_A", "VOR", "VOR_A"] {
        fs::write(home.join("indat").join(format!("RUNDATIN.{}.in", suffix)), "run\n").unwrap();
    }
    home
}

pub fn fake_config(home: &Path) -> TrackConfig {
    TrackConfig {
        track_home: home.to_path_buf(),
        ..TrackConfig::default()
    }
}

/// Behaviour of the fake external tools
#[derive(Clone)]
pub struct FakeTools {
    pub grid_type: &'static str,
    pub years: Vec<i32>,
    pub nx: usize,
    pub ny: usize,
    pub timesteps_per_year: usize,
    /// Variables of the single-year slices `cdo selyear` writes
    pub year_variables: Vec<&'static str>,
    /// Year whose `master` run fails
    pub failing_year: Option<i32>,
    /// Tool name or CDO operator prefix that exits with an error, e.g. `remapcon`
    pub failing_step: Option<&'static str>,
    /// Rendered control files seen by TRACK, as (file name, contents)
    pub controls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeTools {
    pub fn new(years: &[i32], nx: usize, ny: usize, timesteps_per_year: usize) -> Self {
        Self {
            grid_type: "lonlat",
            years: years.to_vec(),
            nx,
            ny,
            timesteps_per_year,
            year_variables: vec!["time", "lat", "lon", "psl"],
            failing_year: None,
            failing_step: None,
            controls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn controls(&self) -> Vec<(String, String)> {
        self.controls.lock().unwrap().clone()
    }

    pub fn handler(&self) -> impl Fn(&ExternalCommand) -> Result<CommandOutput> + Send + Sync + 'static {
        let fake = self.clone();
        move |cmd| fake.respond(cmd)
    }

    fn respond(&self, cmd: &ExternalCommand) -> Result<CommandOutput> {
        let args = &cmd.args;
        let last = |back: usize| PathBuf::from(&args[args.len() - back]);

        if let Some(step) = self.failing_step {
            if cmd.tool_name() == step || args.iter().any(|a| a.starts_with(step)) {
                return Ok(CommandOutput::failure(1, format!("{}: simulated failure", step)));
            }
        }

        match cmd.tool_name().as_str() {
            "cdo" => {
                if args[0] == "griddes" {
                    return Ok(CommandOutput::success(format!(
                        "#\n# gridID 1\n#\ngridtype  = {}\ngridsize  = {}\n",
                        self.grid_type,
                        self.nx * self.ny
                    )));
                }
                if args.iter().any(|a| a == "showyear") {
                    let input = last(1);
                    let name = input.file_name().unwrap().to_string_lossy().into_owned();
                    let years = match name
                        .strip_prefix("tempyear_")
                        .and_then(|rest| rest.strip_suffix(".nc"))
                    {
                        Some(year) => year.to_string(),
                        None => self
                            .years
                            .iter()
                            .map(|y| y.to_string())
                            .collect::<Vec<_>>()
                            .join(" "),
                    };
                    return Ok(CommandOutput::success(format!(" {}\n", years)));
                }
                if args.iter().any(|a| a.starts_with("selyear,")) {
                    write_dataset(
                        &last(1),
                        self.nx,
                        self.ny,
                        self.timesteps_per_year,
                        &self.year_variables,
                    )?;
                    return Ok(CommandOutput::success(""));
                }
                if args.iter().any(|a| a == "merge") {
                    let mut variables: Vec<String> = Vec::new();
                    for input in [last(3), last(2)] {
                        for name in netcdf::open(&input)?.variables().map(|v| v.name()) {
                            if !variables.contains(&name) {
                                variables.push(name);
                            }
                        }
                    }
                    let names: Vec<&str> = variables.iter().map(String::as_str).collect();
                    let steps = self.timesteps_per_year * self.years.len();
                    write_dataset(&last(1), self.nx, self.ny, steps, &names)?;
                    return Ok(CommandOutput::success(""));
                }
                // remapcon: pass the input through
                fs::copy(last(2), last(1))?;
                Ok(CommandOutput::success(""))
            }
            "ncks" | "ncatted" => {
                fs::copy(last(2), last(1))?;
                Ok(CommandOutput::success(""))
            }
            "track.linux" => {
                let control = cmd.stdin.clone().expect("TRACK reads its control file from stdin");
                let contents = fs::read_to_string(&control)?;
                let control_name = control.file_name().unwrap().to_string_lossy().into_owned();
                self.controls.lock().unwrap().push((control_name.clone(), contents.clone()));

                let home = cmd.cwd.clone().expect("TRACK runs from its home directory");
                let year = args[3].trim_start_matches('y');
                if control_name.starts_with("calcvor") {
                    let output = contents.lines().last().unwrap_or_default();
                    fs::write(home.join("indat").join(output), "vorticity")?;
                } else {
                    for band in ["band000", "band001"] {
                        fs::write(
                            home.join("outdat").join(format!("specfil.y{}_{}", year, band)),
                            band,
                        )?;
                    }
                }
                Ok(CommandOutput::success(""))
            }
            "master" => {
                let flag = |name: &str| {
                    args.iter()
                        .find_map(|a| a.strip_prefix(name))
                        .unwrap_or_default()
                        .to_string()
                };
                let job = flag("-c=");
                if let Some(year) = self.failing_year {
                    if job.starts_with(&year.to_string()) {
                        return Ok(CommandOutput::failure(1, "master: tracking job aborted"));
                    }
                }
                let job_dir = PathBuf::from(flag("-o=")).join(&job);
                fs::create_dir_all(&job_dir)?;
                let mut files = vec!["ff_trs_neg", "tr_trs_neg"];
                if job.contains("_vor850_") {
                    files.extend(["ff_trs_pos", "tr_trs_pos"]);
                }
                for file in files {
                    write_gz(&job_dir.join(format!("{}.gz", file)), "0\nTRACK_NUM 1 ADD_FLD 0 0\n")?;
                }
                Ok(CommandOutput::success(""))
            }
            "tr2nc" => {
                let mut output = args[0].clone();
                output.push_str(".nc");
                fs::write(output, "netcdf")?;
                Ok(CommandOutput::success(""))
            }
            other => panic!("unexpected tool {}", other),
        }
    }
}

pub fn write_gz(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    encoder.write_all(contents.as_bytes())?;
    encoder.finish()?;
    Ok(())
}
