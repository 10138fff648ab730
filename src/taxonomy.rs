//! Occupational classification schemes and their column conventions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Levels of the classification, coarsest first
pub const LEVELS: [u8; 4] = [1, 2, 3, 4];

/// Levels produced by rolling leaf rows upward
pub const AGGREGATED_LEVELS: [u8; 3] = [1, 2, 3];

/// The leaf (4-digit) level
pub const LEAF_LEVEL: u8 = 4;

/// A versioned occupational classification (SSYK revision)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    /// SSYK 2012
    #[value(name = "ssyk2012")]
    Ssyk2012,
    /// SSYK 1996
    #[value(name = "ssyk96")]
    Ssyk96,
}

impl Taxonomy {
    /// All supported taxonomies in default processing order
    pub const ALL: [Self; 2] = [Self::Ssyk2012, Self::Ssyk96];

    /// Canonical lowercase name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ssyk2012 => "ssyk2012",
            Self::Ssyk96 => "ssyk96",
        }
    }

    /// Name of the combined "code label" column for a level, e.g. `ssyk2012_3`
    #[must_use]
    pub fn level_column(self, level: u8) -> String {
        format!("{}_{level}", self.name())
    }

    /// The four classification column names, level 1 first
    #[must_use]
    pub fn level_columns(self) -> [String; 4] {
        LEVELS.map(|level| self.level_column(level))
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Taxonomy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssyk2012" => Ok(Self::Ssyk2012),
            "ssyk96" => Ok(Self::Ssyk96),
            other => Err(Error::Config(format!("unknown taxonomy '{other}'"))),
        }
    }
}
