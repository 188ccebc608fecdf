//! Fellow model.
//!
//! Fellows are the people being scheduled. Each has a training level that
//! selects quotas, eligibility windows and rotation requirement tables,
//! plus an ordered list of preferred vacation blocks.
//!
//! Fellows are immutable once loaded from setup; every solver borrows them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Post-graduate training level.
///
/// Ordinal: `Pgy4 < Pgy5 < Pgy6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingLevel {
    /// First fellowship year.
    Pgy4,
    /// Second fellowship year.
    Pgy5,
    /// Third fellowship year.
    Pgy6,
}

impl TrainingLevel {
    /// All levels in ordinal order.
    pub const ALL: [TrainingLevel; 3] = [TrainingLevel::Pgy4, TrainingLevel::Pgy5, TrainingLevel::Pgy6];

    /// Short lowercase tag used in repository keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingLevel::Pgy4 => "pgy4",
            TrainingLevel::Pgy5 => "pgy5",
            TrainingLevel::Pgy6 => "pgy6",
        }
    }
}

impl fmt::Display for TrainingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingLevel::Pgy4 => write!(f, "PGY-4"),
            TrainingLevel::Pgy5 => write!(f, "PGY-5"),
            TrainingLevel::Pgy6 => write!(f, "PGY-6"),
        }
    }
}

/// A fellow that can be assigned duties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fellow {
    /// Unique fellow identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Training level.
    pub level: TrainingLevel,
    /// Preferred vacation block keys, most preferred first.
    pub vacation_preferences: Vec<String>,
}

impl Fellow {
    /// Creates a fellow with no name and no preferences.
    pub fn new(id: impl Into<String>, level: TrainingLevel) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            level,
            vacation_preferences: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a preferred vacation block key.
    pub fn with_vacation_preference(mut self, block_key: impl Into<String>) -> Self {
        self.vacation_preferences.push(block_key.into());
        self
    }

    /// Name for messages, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Returns the fellows of one training level, preserving input order.
pub fn cohort(fellows: &[Fellow], level: TrainingLevel) -> Vec<&Fellow> {
    fellows.iter().filter(|f| f.level == level).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fellow_builder() {
        let f = Fellow::new("F1", TrainingLevel::Pgy5)
            .with_name("Dr. Ada")
            .with_vacation_preference("DEC2")
            .with_vacation_preference("MAY1");

        assert_eq!(f.id, "F1");
        assert_eq!(f.display_name(), "Dr. Ada");
        assert_eq!(f.vacation_preferences, vec!["DEC2", "MAY1"]);
        assert_eq!(Fellow::new("F2", TrainingLevel::Pgy4).display_name(), "F2");
    }

    #[test]
    fn test_level_ordering_and_display() {
        assert!(TrainingLevel::Pgy4 < TrainingLevel::Pgy5);
        assert!(TrainingLevel::Pgy5 < TrainingLevel::Pgy6);
        assert_eq!(TrainingLevel::Pgy6.to_string(), "PGY-6");
        assert_eq!(TrainingLevel::Pgy4.as_str(), "pgy4");
    }

    #[test]
    fn test_cohort_filter() {
        let fellows = vec![
            Fellow::new("A", TrainingLevel::Pgy4),
            Fellow::new("B", TrainingLevel::Pgy5),
            Fellow::new("C", TrainingLevel::Pgy4),
        ];
        let ids: Vec<&str> = cohort(&fellows, TrainingLevel::Pgy4)
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_level_serde() {
        let json = serde_json::to_string(&TrainingLevel::Pgy5).unwrap();
        assert_eq!(json, "\"pgy5\"");
    }
}
