//! 850 hPa relative vorticity from u/v winds, computed by TRACK itself
//!
//! TRACK has a mode that derives vorticity from a wind pair; it is driven by
//! the `calcvor.in` template and writes a binary `.dat` field into `indat/`.

use crate::errors::{Result, TrackError};
use crate::grid::VORTICITY_LEVEL_PA;
use crate::inspector::Dataset;
use crate::process::Toolchain;
use crate::roles::{resolve_wind_roles, Convention};
use crate::template::{ControlTemplate, CALCVOR_TEMPLATE};
use crate::utils::remove_best_effort;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Reject anything but a bare `<name>.dat` file name.
pub fn validate_output_basename(name: &str) -> Result<()> {
    let bare = Path::new(name)
        .file_name()
        .map_or(false, |file_name| file_name == name);
    let stem_ok = name.strip_suffix(".dat").map_or(false, |stem| !stem.is_empty());
    if bare && stem_ok {
        Ok(())
    } else {
        Err(TrackError::Precondition(format!(
            "'{}' must be a bare .dat file name; the output is written to TRACK's indat directory",
            name
        )))
    }
}

/// Put `input` where TRACK can read it. Returns the name relative to `indat/`
/// and the staged copy to delete afterwards, if one was made.
fn stage_input(input: &Path, indat: &Path) -> Result<(String, Option<PathBuf>)> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TrackError::Precondition(format!("{} is not a file", input.display())))?;

    let in_indat = match (input.parent().map(fs::canonicalize), fs::canonicalize(indat)) {
        (Some(Ok(parent)), Ok(indat)) => parent == indat,
        _ => false,
    };
    if in_indat {
        return Ok((file_name, None));
    }

    let staged_name = format!("temp_{}", file_name);
    let staged = indat.join(&staged_name);
    fs::copy(input, &staged)?;
    Ok((staged_name, Some(staged)))
}

/// Derive 850 hPa vorticity from the wind file `uv_path` into
/// `indat/<output_basename>`, returning that path.
///
/// The input should hold exactly one year. For multi-year input the first
/// year reported by CDO tags the run.
pub async fn derive_vorticity(
    tools: &Toolchain<'_>,
    uv_path: &Path,
    output_basename: &str,
    convention: Convention,
    allow_positional: bool,
) -> Result<PathBuf> {
    validate_output_basename(output_basename)?;

    let dataset = Dataset::new(uv_path);
    let (u_name, v_name, rule) =
        resolve_wind_roles(&dataset.variable_names()?, convention, allow_positional)?;
    info!("Wind components {}/{} matched by {}", u_name, v_name, rule);
    let (nx, ny) = dataset.grid_dimensions()?;

    let years = dataset.year_set(tools).await?;
    let year = years[0];
    if years.len() > 1 {
        warn!(
            "{} spans {} years, tagging vorticity run with {}",
            uv_path.display(),
            years.len(),
            year
        );
    }

    let install = tools.install();
    let template = ControlTemplate::load(&install.home().join(CALCVOR_TEMPLATE))?;
    let control = template.render_to(
        &install.home().join(format!("calcvor_{}.test", year)),
        &[
            ("VAR1", u_name),
            ("VAR2", v_name),
            ("NX", nx.to_string()),
            ("NY", ny.to_string()),
            ("LEV", VORTICITY_LEVEL_PA.to_string()),
            ("VOR", output_basename.to_string()),
        ],
    )?;

    let (input_name, staged) = stage_input(uv_path, &install.indat())?;
    let result = tools.run(tools.track(&input_name, year, &control)).await;
    if let Some(staged) = &staged {
        remove_best_effort(staged);
    }
    remove_best_effort(&control);
    result?;

    let output = install.indat().join(output_basename);
    if !output.exists() {
        return Err(TrackError::MissingOutput { path: output });
    }
    info!("Computed 850 hPa vorticity for {} into {}", year, output.display());
    Ok(output)
}
