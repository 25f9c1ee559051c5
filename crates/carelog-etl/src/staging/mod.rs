//! Staging: landing raw extracts in `stage_caregivers` / `stage_carelogs`

pub mod loader;
pub mod models;

use std::fmt;

pub use loader::StagingLoader;
pub use models::{StagedCareVisit, StagedCaregiver, StagedRow};

/// Source entity carried by a staging load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Caregiver,
    CareVisit,
}

impl EntityKind {
    /// Column holding the natural key in both the source and staging table
    pub fn natural_key(self) -> &'static str {
        match self {
            EntityKind::Caregiver => "caregiver_id",
            EntityKind::CareVisit => "carelog_id",
        }
    }

}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Caregiver => f.write_str("caregiver"),
            EntityKind::CareVisit => f.write_str("care-visit"),
        }
    }
}

/// Outcome of one staging load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub inserted_or_updated: u64,
    /// Records dropped because their natural key was empty
    pub skipped: u64,
}

impl StageStats {
    pub fn total(&self) -> u64 {
        self.inserted_or_updated + self.skipped
    }
}

/// Row counts of both staging tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct StageCounts {
    pub caregivers: i64,
    pub carelogs: i64,
}
