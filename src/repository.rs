//! Keyed schedule repository.
//!
//! Every solver reads the schedules it depends on and writes its own result
//! back under a fixed key. Documents are JSON strings carrying a `version`
//! tag; documents written by a newer schema are rejected instead of being
//! half-read.
//!
//! The storage backend is a [`ScheduleStore`]; [`InMemoryStore`] is a
//! cloneable, thread-safe map suitable for tests and single-process use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    AcademicCalendar, CallSchedule, ClinicSchedule, Fellow, HfSchedule, JeopardySchedule,
    RotationSchedule, TrainingLevel,
};
use crate::SCHEMA_VERSION;

// ================================
// Errors
// ================================

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported schema version for {key}: found {found}, supported {supported}")]
    UnsupportedVersion {
        key: String,
        found: u64,
        supported: u32,
    },
}

// ================================
// Keys
// ================================

/// Well-known document keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKey {
    /// Roster and academic year.
    Setup,
    /// Rotation schedule of one level.
    Rotations(TrainingLevel),
    /// Primary-call schedule.
    PrimaryCall,
    /// Jeopardy schedule.
    Jeopardy,
    /// HF coverage schedule.
    Hf,
    /// Clinic schedule.
    Clinic,
}

impl ScheduleKey {
    /// Storage key string.
    pub fn as_key(&self) -> String {
        match self {
            Self::Setup => "setup".to_string(),
            Self::Rotations(level) => format!("rotations/{}", level_slug(*level)),
            Self::PrimaryCall => "primary_call".to_string(),
            Self::Jeopardy => "jeopardy".to_string(),
            Self::Hf => "hf".to_string(),
            Self::Clinic => "clinic".to_string(),
        }
    }
}

fn level_slug(level: TrainingLevel) -> &'static str {
    match level {
        TrainingLevel::Pgy4 => "pgy4",
        TrainingLevel::Pgy5 => "pgy5",
        TrainingLevel::Pgy6 => "pgy6",
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

// ================================
// Setup document
// ================================

/// Roster and academic year: the root input of every solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    /// Schema version tag.
    pub version: u32,
    /// First day of the academic year (July 1).
    pub year_start: NaiveDate,
    /// Fellows of every level.
    pub fellows: Vec<Fellow>,
}

impl Setup {
    /// Creates a setup document.
    pub fn new(year_start: NaiveDate, fellows: Vec<Fellow>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            year_start,
            fellows,
        }
    }

    /// Academic calendar of the setup year.
    pub fn calendar(&self) -> AcademicCalendar {
        AcademicCalendar::new(self.year_start)
    }
}

// ================================
// Storage backends
// ================================

/// Raw keyed document storage.
pub trait ScheduleStore {
    /// Document stored under `key`.
    fn get(&self, key: &str) -> RepositoryResult<Option<String>>;
    /// Stores a document, replacing any previous one.
    fn put(&self, key: &str, document: String) -> RepositoryResult<()>;
    /// Removes a document; returns whether it existed.
    fn remove(&self, key: &str) -> RepositoryResult<bool>;
    /// Every stored key, sorted.
    fn keys(&self) -> RepositoryResult<Vec<String>>;
}

/// In-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("store lock poisoned".to_string())
}

impl ScheduleStore for InMemoryStore {
    fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &str, document: String) -> RepositoryResult<()> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(key.to_string(), document);
        Ok(())
    }

    fn remove(&self, key: &str) -> RepositoryResult<bool> {
        let mut data = self.data.write().map_err(poisoned)?;
        Ok(data.remove(key).is_some())
    }

    fn keys(&self) -> RepositoryResult<Vec<String>> {
        let data = self.data.read().map_err(poisoned)?;
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ================================
// Typed repository
// ================================

/// Typed access to the schedules of one academic year.
#[derive(Debug, Clone)]
pub struct Repository<S> {
    store: S,
}

impl<S: ScheduleStore> Repository<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load<T: DeserializeOwned>(&self, key: ScheduleKey) -> RepositoryResult<Option<T>> {
        let key = key.as_key();
        let Some(document) = self.store.get(&key)? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&document)?;
        let found = value.get("version").and_then(serde_json::Value::as_u64);
        if let Some(found) = found.filter(|v| *v > u64::from(SCHEMA_VERSION)) {
            return Err(RepositoryError::UnsupportedVersion {
                key,
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn save<T: Serialize>(&self, key: ScheduleKey, document: &T) -> RepositoryResult<()> {
        let key = key.as_key();
        let json = serde_json::to_string(document)?;
        debug!(key = %key, bytes = json.len(), "saving schedule document");
        self.store.put(&key, json)
    }

    /// Removes a document; returns whether it existed.
    pub fn clear(&self, key: ScheduleKey) -> RepositoryResult<bool> {
        self.store.remove(&key.as_key())
    }

    /// Loads the setup document.
    pub fn load_setup(&self) -> RepositoryResult<Option<Setup>> {
        self.load(ScheduleKey::Setup)
    }

    /// Saves the setup document.
    pub fn save_setup(&self, setup: &Setup) -> RepositoryResult<()> {
        self.save(ScheduleKey::Setup, setup)
    }

    /// Loads the rotation schedule of a level.
    pub fn load_rotations(&self, level: TrainingLevel) -> RepositoryResult<Option<RotationSchedule>> {
        self.load(ScheduleKey::Rotations(level))
    }

    /// Saves a rotation schedule under its own level.
    pub fn save_rotations(&self, schedule: &RotationSchedule) -> RepositoryResult<()> {
        self.save(ScheduleKey::Rotations(schedule.level), schedule)
    }

    /// Loads the primary-call schedule.
    pub fn load_primary_call(&self) -> RepositoryResult<Option<CallSchedule>> {
        self.load(ScheduleKey::PrimaryCall)
    }

    /// Saves the primary-call schedule.
    pub fn save_primary_call(&self, schedule: &CallSchedule) -> RepositoryResult<()> {
        self.save(ScheduleKey::PrimaryCall, schedule)
    }

    /// Loads the jeopardy schedule.
    pub fn load_jeopardy(&self) -> RepositoryResult<Option<JeopardySchedule>> {
        self.load(ScheduleKey::Jeopardy)
    }

    /// Saves the jeopardy schedule.
    pub fn save_jeopardy(&self, schedule: &JeopardySchedule) -> RepositoryResult<()> {
        self.save(ScheduleKey::Jeopardy, schedule)
    }

    /// Loads the HF schedule.
    pub fn load_hf(&self) -> RepositoryResult<Option<HfSchedule>> {
        self.load(ScheduleKey::Hf)
    }

    /// Saves the HF schedule.
    pub fn save_hf(&self, schedule: &HfSchedule) -> RepositoryResult<()> {
        self.save(ScheduleKey::Hf, schedule)
    }

    /// Loads the clinic schedule.
    pub fn load_clinic(&self) -> RepositoryResult<Option<ClinicSchedule>> {
        self.load(ScheduleKey::Clinic)
    }

    /// Saves the clinic schedule.
    pub fn save_clinic(&self, schedule: &ClinicSchedule) -> RepositoryResult<()> {
        self.save(ScheduleKey::Clinic, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicSession, CoveragePartition, Rotation};
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn repo() -> Repository<InMemoryStore> {
        Repository::new(InMemoryStore::new())
    }

    #[test]
    fn test_key_strings() {
        assert_eq!(ScheduleKey::Setup.as_key(), "setup");
        assert_eq!(
            ScheduleKey::Rotations(TrainingLevel::Pgy5).to_string(),
            "rotations/pgy5"
        );
        assert_eq!(ScheduleKey::PrimaryCall.as_key(), "primary_call");
        assert_eq!(ScheduleKey::Hf.as_key(), "hf");
    }

    #[test]
    fn test_missing_document_is_none() {
        let repo = repo();
        assert!(repo.load_setup().unwrap().is_none());
        assert!(repo.load_rotations(TrainingLevel::Pgy4).unwrap().is_none());
        assert!(!repo.clear(ScheduleKey::Clinic).unwrap());
    }

    #[test]
    fn test_round_trips() {
        let repo = repo();
        let setup = Setup::new(
            date(2024, 7, 1),
            vec![Fellow::new("A", TrainingLevel::Pgy4).with_vacation_preference("DEC2")],
        );
        repo.save_setup(&setup).unwrap();
        assert_eq!(repo.load_setup().unwrap(), Some(setup));

        let mut rotations = RotationSchedule::new(TrainingLevel::Pgy6);
        rotations.set("C", "JAN1", Rotation::Research);
        repo.save_rotations(&rotations).unwrap();
        assert_eq!(repo.load_rotations(TrainingLevel::Pgy6).unwrap(), Some(rotations));
        assert!(repo.load_rotations(TrainingLevel::Pgy5).unwrap().is_none());

        let mut call = CallSchedule::new();
        call.assign(date(2024, 7, 1), "A");
        repo.save_primary_call(&call).unwrap();
        assert_eq!(repo.load_primary_call().unwrap(), Some(call));

        let cal = AcademicCalendar::for_year(2024);
        let partition = CoveragePartition::for_calendar(&cal).unwrap();
        let labor_day = partition.block_for(date(2024, 9, 2)).unwrap();

        let mut jeopardy = JeopardySchedule::new();
        jeopardy.assign_block(labor_day, "A");
        repo.save_jeopardy(&jeopardy).unwrap();
        assert_eq!(repo.load_jeopardy().unwrap(), Some(jeopardy));

        let mut hf = HfSchedule::new();
        hf.assign(labor_day, "A");
        repo.save_hf(&hf).unwrap();
        assert_eq!(repo.load_hf().unwrap(), Some(hf));

        let mut clinic = ClinicSchedule::new();
        clinic.assign(
            date(2024, 7, 2),
            ClinicSession {
                fellow: "A".into(),
                clinic_type: "general".into(),
                weekday: Weekday::Tue,
                block_key: "JUL1".into(),
            },
        );
        repo.save_clinic(&clinic).unwrap();
        assert_eq!(repo.load_clinic().unwrap(), Some(clinic));

        assert_eq!(
            repo.store().keys().unwrap(),
            vec!["clinic", "hf", "jeopardy", "primary_call", "rotations/pgy6", "setup"]
        );
    }

    #[test]
    fn test_newer_version_rejected() {
        let repo = repo();
        let mut call = CallSchedule::new();
        call.version = SCHEMA_VERSION + 1;
        repo.save_primary_call(&call).unwrap();

        let err = repo.load_primary_call().unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::UnsupportedVersion { found, .. } if found == u64::from(SCHEMA_VERSION) + 1
        ));
    }

    #[test]
    fn test_corrupt_document() {
        let store = InMemoryStore::new();
        store.put("hf", "{not json".to_string()).unwrap();
        let repo = Repository::new(store);
        assert!(matches!(
            repo.load_hf().unwrap_err(),
            RepositoryError::Serialization(_)
        ));
    }

    #[test]
    fn test_store_clones_share_data() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.put("k", "v".to_string()).unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        assert!(other.remove("k").unwrap());
        assert!(store.get("k").unwrap().is_none());
    }
}
