//! The fixed registry of Mixtape datasets

use std::fmt;
use std::str::FromStr;

/// A dataset from *Causal Inference: The Mixtape*
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Lmb,
    Castle,
    Card,
    Texas,
    Nsw,
    Abortion,
    Cps,
}

impl Dataset {
    /// All datasets, in registry order
    pub const ALL: [Dataset; 7] = [
        Dataset::Lmb,
        Dataset::Castle,
        Dataset::Card,
        Dataset::Texas,
        Dataset::Nsw,
        Dataset::Abortion,
        Dataset::Cps,
    ];

    /// Short identifier (e.g. "lmb")
    pub fn id(self) -> &'static str {
        match self {
            Dataset::Lmb => "lmb",
            Dataset::Castle => "castle",
            Dataset::Card => "card",
            Dataset::Texas => "texas",
            Dataset::Nsw => "nsw",
            Dataset::Abortion => "abortion",
            Dataset::Cps => "cps",
        }
    }

    /// Filename in the remote repository
    pub fn filename(self) -> &'static str {
        match self {
            Dataset::Lmb => "lmb-data.dta",
            Dataset::Castle => "castle.dta",
            Dataset::Card => "card.dta",
            Dataset::Texas => "texas.dta",
            Dataset::Nsw => "nsw_mixtape.dta",
            Dataset::Abortion => "abortion.dta",
            Dataset::Cps => "cps_mixtape.dta",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Dataset::Lmb => "Lee-Moretti-Butler close elections data (Ch. 6, Regression Discontinuity)",
            Dataset::Castle => "Castle doctrine (Stand Your Ground) data (Ch. 9, Difference-in-Differences)",
            Dataset::Card => "Card (1995) returns to schooling data (Ch. 7, Instrumental Variables)",
            Dataset::Texas => "Texas incarceration data (Ch. 10, Synthetic Control)",
            Dataset::Nsw => "National Supported Work data (Ch. 5, Matching and Subclassification)",
            Dataset::Abortion => "Abortion legalization data (Ch. 9, Difference-in-Differences)",
            Dataset::Cps => "CPS control group data (Ch. 5, Matching and Subclassification)",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when parsing an unknown dataset identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown dataset: {0}")]
pub struct UnknownDataset(pub String);

impl FromStr for Dataset {
    type Err = UnknownDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDataset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_filenames_are_unique() {
        let names: HashSet<_> = Dataset::ALL.iter().map(|d| d.filename()).collect();
        assert_eq!(names.len(), Dataset::ALL.len());
    }

    #[test]
    fn test_fixed_filenames() {
        assert_eq!(Dataset::Lmb.filename(), "lmb-data.dta");
        assert_eq!(Dataset::Nsw.filename(), "nsw_mixtape.dta");
        assert_eq!(Dataset::Cps.filename(), "cps_mixtape.dta");
    }

    #[test]
    fn test_parse_round_trip() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.id().parse::<Dataset>().unwrap(), dataset);
        }
        assert_eq!("CASTLE".parse::<Dataset>().unwrap(), Dataset::Castle);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "nlsy".parse::<Dataset>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown dataset: nlsy");
    }
}
