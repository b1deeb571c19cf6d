//! Preprocessing of raw CMIP6/ERA5 files into TRACK-ready input
//!
//! Bound variables are stripped with `ncks`, non-Gaussian grids are
//! conservatively remapped with CDO to the nearest supported Gaussian grid, and
//! `_FillValue`/`missing_value` attributes are deleted with `ncatted`. All
//! outputs have fixed names under the work directory and every tool runs with
//! overwrite enabled, so running twice on the same input gives the same file.

use crate::errors::Result;
use crate::grid::ResolutionClass;
use crate::inspector::Dataset;
use crate::process::Toolchain;
use crate::roles::{identify_component, resolve_roles, Convention, FieldKind, WindComponent};
use crate::utils::remove_best_effort;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Auxiliary variables TRACK cannot read
pub const BOUND_VARIABLES: [&str; 3] = ["time_bnds", "lat_bnds", "lon_bnds"];

/// Final output path of `preprocess` for `input`
pub fn cleaned_path(input: &Path, work_dir: &Path) -> PathBuf {
    work_dir.join(format!("{}_filled.nc", Dataset::new(input).stem()))
}

/// Produce a cleaned, Gaussian, fill-value-free copy of `input` in `work_dir`.
///
/// The variable set is validated before any external tool runs; `field`
/// picks the positional rule when no known variable name is present.
pub async fn preprocess(
    tools: &Toolchain<'_>,
    input: &Path,
    work_dir: &Path,
    convention: Convention,
    allow_positional: bool,
    field: Option<FieldKind>,
) -> Result<PathBuf> {
    let dataset = Dataset::new(input);
    let variables = dataset.variable_names()?;
    let roles = resolve_roles(&variables, convention, allow_positional, field)?;
    info!(
        "Preprocessing {} ({:?} field)",
        input.display(),
        roles.field()
    );

    fs::create_dir_all(work_dir)?;
    let mut intermediates = Vec::new();
    let result = run_steps(tools, &dataset, &variables, work_dir, &mut intermediates).await;
    for path in &intermediates {
        remove_best_effort(path);
    }
    result
}

async fn run_steps(
    tools: &Toolchain<'_>,
    dataset: &Dataset,
    variables: &[String],
    work_dir: &Path,
    intermediates: &mut Vec<PathBuf>,
) -> Result<PathBuf> {
    let stem = dataset.stem();

    let bounds: Vec<&str> = BOUND_VARIABLES
        .iter()
        .copied()
        .filter(|b| variables.iter().any(|v| v == b))
        .collect();
    let stripped = if bounds.is_empty() {
        dataset.path().to_path_buf()
    } else {
        let output = work_dir.join(format!("{}_extr.nc", stem));
        intermediates.push(output.clone());
        tools
            .run(tools.ncks_exclude(&bounds, dataset.path(), &output))
            .await?;
        info!("Removed {}", bounds.join(", "));
        output
    };

    let stripped_dataset = Dataset::new(&stripped);
    let grid_type = stripped_dataset.grid_type(tools).await?;
    let gridded = if grid_type.is_gaussian() {
        info!("No regridding needed.");
        stripped
    } else {
        let (_, ny) = stripped_dataset.grid_dimensions()?;
        let class = ResolutionClass::for_latitudes(ny);
        let output = work_dir.join(format!("{}_gaussian.nc", stem));
        intermediates.push(output.clone());
        tools
            .run(tools.cdo_remapcon(class.cdo_grid(), &stripped, &output))
            .await?;
        info!("Regridded {} grid with {} latitudes to {} Gaussian grid.", grid_type, ny, class);
        output
    };

    let filled = work_dir.join(format!("{}_filled.nc", stem));
    tools
        .run(tools.ncatted_strip_fill(&gridded, &filled))
        .await?;
    info!("Removed missing value attributes, if any.");
    Ok(filled)
}

/// Merge separate CMIP6 `ua` and `va` files into one file, u first.
pub async fn merge_uv(
    tools: &Toolchain<'_>,
    file1: &Path,
    file2: &Path,
    output: &Path,
) -> Result<PathBuf> {
    let component = identify_component(&Dataset::new(file1).variable_names()?)?;
    let (u_file, v_file) = match component {
        WindComponent::U => (file1, file2),
        WindComponent::V => (file2, file1),
    };
    tools.run(tools.cdo_merge(u_file, v_file, output)).await?;
    info!("Merged U and V files into {}", output.display());
    Ok(output.to_path_buf())
}
