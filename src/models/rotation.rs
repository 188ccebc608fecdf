//! Rotation labels and the per-level rotation schedule.
//!
//! A rotation schedule maps fellow → block key → rotation label for one
//! training-level cohort. Every label except [`Rotation::Elective`] has a
//! capacity of one fellow per block within the cohort; vacation has its
//! own cross-level cap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::TrainingLevel;
use crate::SCHEMA_VERSION;

/// Duty label placed into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Vacation.
    Vacation,
    /// Coronary care unit (ICU-equivalent).
    Ccu,
    /// Catheterization lab.
    Cath,
    /// Echocardiography.
    Echo,
    /// Nuclear cardiology.
    Nuclear,
    /// Electrophysiology.
    Ep,
    /// Inpatient consult service.
    Consults,
    /// Heart-failure service.
    HeartFailure,
    /// Advanced imaging (CT/MR).
    Imaging,
    /// Research.
    Research,
    /// Uncapped fill label.
    Elective,
}

impl Rotation {
    /// Whether this is the uncapped fill label.
    pub fn is_fill(&self) -> bool {
        matches!(self, Rotation::Elective)
    }

    /// Short label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Rotation::Vacation => "vacation",
            Rotation::Ccu => "CCU",
            Rotation::Cath => "cath",
            Rotation::Echo => "echo",
            Rotation::Nuclear => "nuclear",
            Rotation::Ep => "EP",
            Rotation::Consults => "consults",
            Rotation::HeartFailure => "heart failure",
            Rotation::Imaging => "imaging",
            Rotation::Research => "research",
            Rotation::Elective => "elective",
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rotation assignments of one training-level cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSchedule {
    /// Schema version tag.
    pub version: u32,
    /// Cohort level.
    pub level: TrainingLevel,
    /// fellow id → block key → rotation.
    pub assignments: BTreeMap<String, BTreeMap<String, Rotation>>,
}

impl RotationSchedule {
    /// Creates an empty schedule for a level.
    pub fn new(level: TrainingLevel) -> Self {
        Self {
            version: SCHEMA_VERSION,
            level,
            assignments: BTreeMap::new(),
        }
    }

    /// Rotation of a fellow in a block.
    pub fn get(&self, fellow_id: &str, block_key: &str) -> Option<Rotation> {
        self.assignments
            .get(fellow_id)
            .and_then(|blocks| blocks.get(block_key))
            .copied()
    }

    /// Sets the rotation of a fellow in a block.
    pub fn set(&mut self, fellow_id: &str, block_key: &str, rotation: Rotation) {
        self.assignments
            .entry(fellow_id.to_string())
            .or_default()
            .insert(block_key.to_string(), rotation);
    }

    /// Clears a fellow's block.
    pub fn clear(&mut self, fellow_id: &str, block_key: &str) -> Option<Rotation> {
        self.assignments
            .get_mut(fellow_id)
            .and_then(|blocks| blocks.remove(block_key))
    }

    /// Block keys holding a rotation for a fellow.
    pub fn blocks_with(&self, fellow_id: &str, rotation: Rotation) -> Vec<&str> {
        self.assignments
            .get(fellow_id)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|(_, r)| **r == rotation)
                    .map(|(k, _)| k.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of blocks a fellow holds with a rotation.
    pub fn count(&self, fellow_id: &str, rotation: Rotation) -> usize {
        self.blocks_with(fellow_id, rotation).len()
    }

    /// Fellows holding a rotation in a block.
    pub fn holders(&self, block_key: &str, rotation: Rotation) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|(_, blocks)| blocks.get(block_key) == Some(&rotation))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Fellow ids present in the schedule.
    pub fn fellow_ids(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut s = RotationSchedule::new(TrainingLevel::Pgy4);
        s.set("F1", "JUL1", Rotation::Ccu);
        s.set("F1", "JUL2", Rotation::Ccu);
        s.set("F2", "JUL1", Rotation::Vacation);

        assert_eq!(s.get("F1", "JUL1"), Some(Rotation::Ccu));
        assert_eq!(s.count("F1", Rotation::Ccu), 2);
        assert_eq!(s.holders("JUL1", Rotation::Vacation), vec!["F2"]);
        assert_eq!(s.clear("F1", "JUL2"), Some(Rotation::Ccu));
        assert_eq!(s.get("F1", "JUL2"), None);
        assert_eq!(s.fellow_ids().count(), 2);
    }

    #[test]
    fn test_fill_label() {
        assert!(Rotation::Elective.is_fill());
        assert!(!Rotation::Vacation.is_fill());
        assert_eq!(Rotation::HeartFailure.to_string(), "heart failure");
    }

    #[test]
    fn test_serde_shape() {
        let mut s = RotationSchedule::new(TrainingLevel::Pgy5);
        s.set("F1", "AUG1", Rotation::HeartFailure);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"AUG1\":\"heart_failure\""));
        let back: RotationSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
