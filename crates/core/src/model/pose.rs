use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown pose: {0}")]
pub struct PoseParseError(pub String);

/// The closed set of practice poses.
///
/// Declaration order is the enumeration order used to break ranking ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pose {
    Tree,
    Chair,
    Cobra,
    Warrior,
    Dog,
    Shoulderstand,
    Triangle,
}

impl Pose {
    pub const COUNT: usize = 7;

    pub const ALL: [Pose; Self::COUNT] = [
        Pose::Tree,
        Pose::Chair,
        Pose::Cobra,
        Pose::Warrior,
        Pose::Dog,
        Pose::Shoulderstand,
        Pose::Triangle,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Pose::Tree => "Tree",
            Pose::Chair => "Chair",
            Pose::Cobra => "Cobra",
            Pose::Warrior => "Warrior",
            Pose::Dog => "Dog",
            Pose::Shoulderstand => "Shoulderstand",
            Pose::Triangle => "Triangle",
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pose {
    type Err = PoseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Tree" => Ok(Pose::Tree),
            "Chair" => Ok(Pose::Chair),
            "Cobra" => Ok(Pose::Cobra),
            "Warrior" => Ok(Pose::Warrior),
            "Dog" => Ok(Pose::Dog),
            "Shoulderstand" => Ok(Pose::Shoulderstand),
            // The pose classifier ships this label misspelled.
            "Triangle" | "Traingle" => Ok(Pose::Triangle),
            other => Err(PoseParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names_and_classifier_alias() {
        assert_eq!("Dog".parse::<Pose>().unwrap(), Pose::Dog);
        assert_eq!("Traingle".parse::<Pose>().unwrap(), Pose::Triangle);
        assert!("Lotus".parse::<Pose>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for pose in Pose::ALL {
            assert_eq!(pose.to_string().parse::<Pose>().unwrap(), pose);
        }
    }
}
