//! Variable role assignment
//!
//! Maps the semantic fields TRACK needs (sea-level pressure, or a zonal and
//! meridional wind pair) onto variable names in a file. Known CMIP6 and ERA5
//! names are tried first; the positional rule of the older wrappers (last
//! variable is the field, last two are u and v) is only used when asked for.

use crate::errors::{Result, TrackError};
use clap::ValueEnum;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Naming convention of the input data
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Convention {
    Cmip6,
    Era5,
}

impl Convention {
    fn pressure_names(self) -> &'static [&'static str] {
        match self {
            Convention::Cmip6 => &["psl"],
            Convention::Era5 => &["msl", "var151"],
        }
    }

    fn wind_pairs(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Convention::Cmip6 => &[("ua", "va")],
            Convention::Era5 => &[("var131", "var132"), ("u", "v")],
        }
    }
}

/// What kind of field a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum FieldKind {
    Pressure,
    Wind,
}

/// Which rule produced an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchRule {
    KnownName,
    Positional,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::KnownName => write!(f, "known variable name"),
            MatchRule::Positional => write!(f, "variable position"),
        }
    }
}

/// Resolved roles of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleAssignment {
    Pressure {
        name: String,
        rule: MatchRule,
    },
    Wind {
        u: String,
        v: String,
        rule: MatchRule,
    },
}

impl RoleAssignment {
    pub fn field(&self) -> FieldKind {
        match self {
            RoleAssignment::Pressure { .. } => FieldKind::Pressure,
            RoleAssignment::Wind { .. } => FieldKind::Wind,
        }
    }

    pub fn rule(&self) -> MatchRule {
        match self {
            RoleAssignment::Pressure { rule, .. } | RoleAssignment::Wind { rule, .. } => *rule,
        }
    }
}

fn unrecognized(variables: &[String]) -> TrackError {
    TrackError::UnrecognizedVariables {
        variables: variables.to_vec(),
    }
}

fn known_wind_pair(variables: &[String], convention: Convention) -> Option<(String, String)> {
    let has = |name: &str| variables.iter().any(|v| v == name);
    convention
        .wind_pairs()
        .iter()
        .find(|(u, v)| has(u) && has(v))
        .map(|(u, v)| (u.to_string(), v.to_string()))
}

/// Decide whether a file holds pressure or a wind pair and name the variables.
///
/// A known wind pair takes precedence over a known pressure name. With
/// `allow_positional`, a file with no known names falls back to the positional
/// rule for the field named by `field`: the last variable for pressure, the
/// last two for a wind pair. Without a field the positional rule cannot tell
/// the two apart and the variables stay unrecognized. A `field` that
/// contradicts the known names is a precondition failure.
pub fn resolve_roles(
    variables: &[String],
    convention: Convention,
    allow_positional: bool,
    field: Option<FieldKind>,
) -> Result<RoleAssignment> {
    let assignment = if let Some((u, v)) = known_wind_pair(variables, convention) {
        RoleAssignment::Wind {
            u,
            v,
            rule: MatchRule::KnownName,
        }
    } else if let Some(name) = convention
        .pressure_names()
        .iter()
        .find(|name| variables.iter().any(|v| v == *name))
    {
        RoleAssignment::Pressure {
            name: name.to_string(),
            rule: MatchRule::KnownName,
        }
    } else if allow_positional {
        positional_roles(variables, field)?
    } else {
        return Err(unrecognized(variables));
    };

    if let Some(requested) = field {
        if requested != assignment.field() {
            return Err(TrackError::Precondition(format!(
                "{:?} field requested but the variables {:?} hold a {:?} field",
                requested,
                variables,
                assignment.field()
            )));
        }
    }

    debug!("Variable roles {:?} matched by {}", assignment, assignment.rule());
    Ok(assignment)
}

fn positional_roles(variables: &[String], field: Option<FieldKind>) -> Result<RoleAssignment> {
    let n = variables.len();
    match field {
        Some(FieldKind::Pressure) if n >= 1 => Ok(RoleAssignment::Pressure {
            name: variables[n - 1].clone(),
            rule: MatchRule::Positional,
        }),
        Some(FieldKind::Wind) if n >= 2 => Ok(RoleAssignment::Wind {
            u: variables[n - 2].clone(),
            v: variables[n - 1].clone(),
            rule: MatchRule::Positional,
        }),
        _ => Err(unrecognized(variables)),
    }
}

/// Name the u and v variables of a wind file.
///
/// With `allow_positional`, the last two variables are taken as u and v when
/// no known pair is present.
pub fn resolve_wind_roles(
    variables: &[String],
    convention: Convention,
    allow_positional: bool,
) -> Result<(String, String, MatchRule)> {
    if let Some((u, v)) = known_wind_pair(variables, convention) {
        return Ok((u, v, MatchRule::KnownName));
    }
    if allow_positional && variables.len() >= 2 {
        let n = variables.len();
        return Ok((
            variables[n - 2].clone(),
            variables[n - 1].clone(),
            MatchRule::Positional,
        ));
    }
    Err(unrecognized(variables))
}

/// Wind component held in a single-variable CMIP6 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindComponent {
    U,
    V,
}

/// Identify whether a file holds `ua` or `va`.
pub fn identify_component(variables: &[String]) -> Result<WindComponent> {
    let has = |name: &str| variables.iter().any(|v| v == name);
    match (has("ua"), has("va")) {
        (true, false) => Ok(WindComponent::U),
        (false, true) => Ok(WindComponent::V),
        _ => Err(unrecognized(variables)),
    }
}
