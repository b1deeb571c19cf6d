//! Control-file templating
//!
//! TRACK reads its answers to interactive prompts from stdin, so each run is
//! driven by a control file produced from a template shipped with the
//! installation. Substitution follows `sed s/TOKEN/value/`: each token is
//! replaced at its first occurrence on every line, tokens applied in order.

use crate::errors::{Result, TrackError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Calcvor template in TRACK home
pub const CALCVOR_TEMPLATE: &str = "calcvor.in";
/// Spectral filter template for NetCDF input
pub const SPECFILT_NC_TEMPLATE: &str = "specfilt_nc.in";
/// Spectral filter template for TRACK binary `.dat` input
pub const SPECFILT_DAT_TEMPLATE: &str = "specfilt.in";

#[derive(Debug, Clone)]
pub struct ControlTemplate {
    source: PathBuf,
    text: String,
}

impl ControlTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            TrackError::Precondition(format!(
                "cannot read control template {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn render(&self, substitutions: &[(&str, String)]) -> String {
        render(&self.text, substitutions)
    }

    /// Render and write the control file, returning its path.
    pub fn render_to(&self, output: &Path, substitutions: &[(&str, String)]) -> Result<PathBuf> {
        fs::write(output, self.render(substitutions))?;
        debug!("Rendered {} into {}", self.source.display(), output.display());
        Ok(output.to_path_buf())
    }
}

/// Apply `s/token/value/` for each substitution, in order, on every line.
pub fn render(text: &str, substitutions: &[(&str, String)]) -> String {
    let mut rendered = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let mut line = line.to_string();
        for (token, value) in substitutions {
            if let Some(pos) = line.find(*token) {
                line.replace_range(pos..pos + token.len(), value);
            }
        }
        rendered.push_str(&line);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_per_line_only() {
        let out = render("NX NX\nNY\n", &[("NX", "192".into()), ("NY", "96".into())]);
        assert_eq!(out, "192 NX\n96\n");
    }

    #[test]
    fn substitutions_apply_in_order() {
        // VOR replaced after VAR1/VAR2 so a value containing VOR is left alone
        let out = render(
            "VAR1\nVAR2\nVOR\n",
            &[
                ("VAR1", "ua".into()),
                ("VAR2", "va".into()),
                ("VOR", "vor850_1990.dat".into()),
            ],
        );
        assert_eq!(out, "ua\nva\nvor850_1990.dat\n");
    }

    #[test]
    fn missing_trailing_newline_is_kept() {
        assert_eq!(render("TRUNC", &[("TRUNC", "63".into())]), "63");
    }

    #[test]
    fn missing_template_is_a_precondition_error() {
        let err = ControlTemplate::load(Path::new("/nonexistent/calcvor.in")).unwrap_err();
        assert!(matches!(err, TrackError::Precondition(_)));
    }
}
