use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brigade_core::{DomainError, impl_uuid_newtype};

/// Station identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(Uuid);

impl_uuid_newtype!(StationId, "StationId");

/// Kind of preparation point. Stations of one type share a pending queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    Kitchen,
    Bar,
    Other,
}

impl StationType {
    pub const ALL: [StationType; 3] = [StationType::Kitchen, StationType::Bar, StationType::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Kitchen => "kitchen",
            StationType::Bar => "bar",
            StationType::Other => "other",
        }
    }
}

impl core::fmt::Display for StationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationType {
    type Err = DomainError;

    /// Case-insensitive ("Kitchen", "BAR", "other").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kitchen" => Ok(StationType::Kitchen),
            "bar" => Ok(StationType::Bar),
            "other" => Ok(StationType::Other),
            other => Err(DomainError::validation(format!("unknown station type '{other}'"))),
        }
    }
}

/// A physical preparation point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub station_type: StationType,
}

impl Station {
    pub fn route(&self) -> StationRoute {
        StationRoute {
            station_id: self.id,
            station_type: self.station_type,
        }
    }
}

/// Where a dispatched item is prepared.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationRoute {
    pub station_id: StationId,
    pub station_type: StationType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_type_parses_case_insensitively() {
        assert_eq!("Kitchen".parse::<StationType>().unwrap(), StationType::Kitchen);
        assert_eq!(" BAR ".parse::<StationType>().unwrap(), StationType::Bar);
        assert!(matches!(
            "grill".parse::<StationType>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn station_type_serializes_lowercase() {
        let json = serde_json::to_string(&StationType::Bar).unwrap();
        assert_eq!(json, "\"bar\"");
        assert_eq!(StationType::Kitchen.to_string(), "kitchen");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_casing_of_a_known_type_parses(
                idx in 0usize..3,
                mask in proptest::collection::vec(any::<bool>(), 7),
            ) {
                let station_type = StationType::ALL[idx];
                let raw: String = station_type
                    .as_str()
                    .chars()
                    .zip(mask.iter().cycle())
                    .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                    .collect();
                prop_assert_eq!(raw.parse::<StationType>().unwrap(), station_type);
            }
        }
    }
}
