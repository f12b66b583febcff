//! Geographic resolution selectors.

use crate::types::columns::{COMMUNE, REGION};
use crate::types::region::region_names;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Label the dashboard uses for [`Resolution::AllRegions`].
pub const ALL_REGIONS_LABEL: &str = "Todas las regiones";
/// Label the dashboard uses for [`Resolution::AllCommunes`].
pub const ALL_COMMUNES_LABEL: &str = "Todas las comunas";

/// The level of geographic grouping or filtering applied before charting.
///
/// # Examples
///
/// ```
/// use calidad_aire::Resolution;
///
/// let parsed: Resolution = "Todas las regiones".parse().unwrap();
/// assert_eq!(parsed, Resolution::AllRegions);
///
/// let maule: Resolution = "Región del Maule".parse().unwrap();
/// assert_eq!(maule, Resolution::SingleRegion("Región del Maule".to_string()));
/// assert_eq!(maule.group_column(), "commune");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    /// Aggregate communes into one row per region; entities are regions.
    #[default]
    AllRegions,
    /// Keep every commune; entities are communes.
    AllCommunes,
    /// Keep only the communes of one region (official long name).
    /// A name absent from the data selects nothing.
    SingleRegion(String),
}

impl Resolution {
    /// Column whose distinct values become the chart entities.
    pub fn group_column(&self) -> &'static str {
        match self {
            Resolution::AllRegions => REGION,
            Resolution::AllCommunes | Resolution::SingleRegion(_) => COMMUNE,
        }
    }

    /// The selector list offered by the dashboard sidebar: the all-regions
    /// aggregate followed by every region in catalogue order.
    pub fn choices() -> Vec<Resolution> {
        std::iter::once(Resolution::AllRegions)
            .chain(region_names().map(|name| Resolution::SingleRegion(name.to_string())))
            .collect()
    }

    pub fn label(&self) -> &str {
        match self {
            Resolution::AllRegions => ALL_REGIONS_LABEL,
            Resolution::AllCommunes => ALL_COMMUNES_LABEL,
            Resolution::SingleRegion(name) => name,
        }
    }
}

impl FromStr for Resolution {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            ALL_REGIONS_LABEL => Resolution::AllRegions,
            ALL_COMMUNES_LABEL => Resolution::AllCommunes,
            other => Resolution::SingleRegion(other.to_string()),
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
