//! Grid classification and the fixed constants of the TRACK protocol
//!
//! TRACK only accepts a handful of Gaussian resolutions and two spectral
//! truncations. The ladders below pick among them from the latitude count of a
//! dataset, and `chunk_count` reproduces how `master` splits one year of data.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

/// Number of timesteps `master` puts in one chunk.
pub const CHUNK_SPAN: usize = 62;

/// Pressure level used for the vorticity derivation, in Pa.
pub const VORTICITY_LEVEL_PA: u32 = 85000;

/// Latitude count from which the T63 truncation is used.
pub const T63_MIN_LATITUDES: usize = 96;

/// Grid type as reported by `cdo griddes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridType {
    Gaussian,
    Other(String),
}

impl GridType {
    pub fn is_gaussian(&self) -> bool {
        matches!(self, GridType::Gaussian)
    }

    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("gaussian") {
            GridType::Gaussian
        } else {
            GridType::Other(name.to_string())
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridType::Gaussian => write!(f, "gaussian"),
            GridType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Target Gaussian grid for regridding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionClass {
    N32,
    N48,
    N64,
    N80,
}

impl ResolutionClass {
    /// All classes, coarsest first.
    pub const LADDER: [ResolutionClass; 4] = [
        ResolutionClass::N32,
        ResolutionClass::N48,
        ResolutionClass::N64,
        ResolutionClass::N80,
    ];

    /// Largest latitude count mapped onto this class. `None` means unbounded.
    pub fn max_latitudes(self) -> Option<usize> {
        match self {
            ResolutionClass::N32 => Some(80),
            ResolutionClass::N48 => Some(112),
            ResolutionClass::N64 => Some(150),
            ResolutionClass::N80 => None,
        }
    }

    /// Smallest class whose threshold is at least `ny`.
    pub fn for_latitudes(ny: usize) -> Self {
        Self::LADDER
            .into_iter()
            .find(|class| class.max_latitudes().map_or(true, |max| ny <= max))
            .unwrap_or(ResolutionClass::N80)
    }

    /// Grid name understood by CDO, e.g. `n48`.
    pub fn cdo_grid(self) -> &'static str {
        match self {
            ResolutionClass::N32 => "n32",
            ResolutionClass::N48 => "n48",
            ResolutionClass::N64 => "n64",
            ResolutionClass::N80 => "n80",
        }
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cdo_grid())
    }
}

/// Spectral truncation profile for the filtering step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpectralTruncation {
    T42,
    T63,
}

impl SpectralTruncation {
    pub fn for_latitudes(ny: usize) -> Self {
        if ny >= T63_MIN_LATITUDES {
            SpectralTruncation::T63
        } else {
            SpectralTruncation::T42
        }
    }

    /// Wave number substituted for `TRUNC` in the filter control file.
    pub fn wave_number(self) -> u32 {
        match self {
            SpectralTruncation::T42 => 42,
            SpectralTruncation::T63 => 63,
        }
    }

    /// Name of the filtered band file handed to `master`.
    pub fn filtered_file_name(self, year: i32) -> String {
        format!("{}filt_{}.dat", self, year)
    }
}

impl fmt::Display for SpectralTruncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.wave_number())
    }
}

/// Tracking hemisphere
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Hemisphere {
    #[value(name = "NH")]
    NH,
    #[value(name = "SH")]
    SH,
}

impl Hemisphere {
    /// Initialisation profile passed to `master -k`, e.g. `initial.T63_NH`.
    pub fn initial_profile(self, truncation: SpectralTruncation) -> String {
        format!("initial.{}_{}", truncation, self)
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hemisphere::NH => write!(f, "NH"),
            Hemisphere::SH => write!(f, "SH"),
        }
    }
}

/// Number of `master` chunks needed for `timesteps` steps.
pub fn chunk_count(timesteps: usize) -> usize {
    timesteps.div_ceil(CHUNK_SPAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_ladder_boundaries() {
        assert_eq!(ResolutionClass::for_latitudes(1), ResolutionClass::N32);
        assert_eq!(ResolutionClass::for_latitudes(80), ResolutionClass::N32);
        assert_eq!(ResolutionClass::for_latitudes(81), ResolutionClass::N48);
        assert_eq!(ResolutionClass::for_latitudes(112), ResolutionClass::N48);
        assert_eq!(ResolutionClass::for_latitudes(113), ResolutionClass::N64);
        assert_eq!(ResolutionClass::for_latitudes(150), ResolutionClass::N64);
        assert_eq!(ResolutionClass::for_latitudes(151), ResolutionClass::N80);
        assert_eq!(ResolutionClass::for_latitudes(721), ResolutionClass::N80);
    }

    #[test]
    fn resolution_ladder_is_monotonic() {
        let mut previous = ResolutionClass::for_latitudes(0);
        for ny in 1..1000 {
            let class = ResolutionClass::for_latitudes(ny);
            assert!(class >= previous, "ladder decreased at ny={}", ny);
            if let Some(max) = class.max_latitudes() {
                assert!(ny <= max);
            }
            previous = class;
        }
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(62), 1);
        assert_eq!(chunk_count(63), 2);
        assert_eq!(chunk_count(124), 2);
        assert_eq!(chunk_count(125), 3);
        assert_eq!(chunk_count(1460), 24);
    }

    #[test]
    fn truncation_switches_at_96() {
        assert_eq!(SpectralTruncation::for_latitudes(95), SpectralTruncation::T42);
        assert_eq!(SpectralTruncation::for_latitudes(96), SpectralTruncation::T63);
        assert_eq!(SpectralTruncation::T63.filtered_file_name(1990), "T63filt_1990.dat");
    }

    #[test]
    fn initial_profile_follows_hemisphere() {
        assert_eq!(
            Hemisphere::SH.initial_profile(SpectralTruncation::T42),
            "initial.T42_SH"
        );
        assert_eq!(
            Hemisphere::NH.initial_profile(SpectralTruncation::T63),
            "initial.T63_NH"
        );
    }

    #[test]
    fn grid_type_names() {
        assert!(GridType::from_name("gaussian").is_gaussian());
        assert_eq!(GridType::from_name("lonlat"), GridType::Other("lonlat".into()));
    }
}
