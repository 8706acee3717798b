use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entitlement tiers, ordered by privilege.
///
/// Distinct from "no active package": resolvers return `Option<Package>`
/// so an empty entitlement set can never be confused with `Basis`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Package {
    Basis,
    #[serde(rename = "Basis+")]
    BasisPlus,
    Premium,
}

/// Raised when a stored or submitted package label is not a known tier.
#[derive(Debug, Error)]
#[error("unknown package tier: {0}")]
pub struct ParsePackageError(pub String);

impl Package {
    /// Priority rank used to resolve overlapping subscriptions.
    pub fn rank(self) -> u8 {
        match self {
            Package::Basis => 1,
            Package::BasisPlus => 2,
            Package::Premium => 3,
        }
    }

    /// The wire/storage label of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Package::Basis => "Basis",
            Package::BasisPlus => "Basis+",
            Package::Premium => "Premium",
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Package {
    type Err = ParsePackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Basis" => Ok(Package::Basis),
            "Basis+" => Ok(Package::BasisPlus),
            "Premium" => Ok(Package::Premium),
            other => Err(ParsePackageError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_tiers() {
        assert!(Package::Basis.rank() < Package::BasisPlus.rank());
        assert!(Package::BasisPlus.rank() < Package::Premium.rank());
        assert!(Package::Basis < Package::Premium);
    }

    #[test]
    fn test_labels_round_trip() {
        for paket in [Package::Basis, Package::BasisPlus, Package::Premium] {
            assert_eq!(paket.as_str().parse::<Package>().expect("parse"), paket);
        }
        assert!("Kein Abo".parse::<Package>().is_err());
    }

    #[test]
    fn test_serializes_with_wire_labels() {
        assert_eq!(
            serde_json::to_string(&Package::BasisPlus).expect("json"),
            r#""Basis+""#
        );
    }
}
