//! Lookup dimensions derived from staged values
//!
//! Every dimension is an insert-if-absent set of distinct non-null staged
//! values. Locations additionally carry a display name that is filled in
//! once: the first non-null name sticks and is never replaced.

use sqlx::PgPool;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::error::{DbContext, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Location,
    Franchisor,
    Agency,
    Profile,
    ExternalIdentifier,
    ApplicantStatus,
    EmploymentStatus,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Location,
        Dimension::Franchisor,
        Dimension::Agency,
        Dimension::Profile,
        Dimension::ExternalIdentifier,
        Dimension::ApplicantStatus,
        Dimension::EmploymentStatus,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Dimension::Location => "model_locations",
            Dimension::Franchisor => "model_franchisor",
            Dimension::Agency => "model_agency",
            Dimension::Profile => "model_profile",
            Dimension::ExternalIdentifier => "model_external_identifier",
            Dimension::ApplicantStatus => "model_applicant_status",
            Dimension::EmploymentStatus => "model_employment_status",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// One population statement: a dimension fed from one staging table
struct Population {
    dimension: Dimension,
    source: &'static str,
    sql: &'static str,
}

// Run in order: caregivers before care-visits for shared dimensions.
// ORDER BY keeps surrogate keys of the status dimensions reproducible.
const POPULATIONS: &[Population] = &[
    Population {
        dimension: Dimension::Location,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_locations (locations_id, name)
            SELECT DISTINCT ON (locations_id) locations_id, location_name
            FROM stage_caregivers
            WHERE locations_id IS NOT NULL
            ORDER BY locations_id, location_name NULLS LAST
            ON CONFLICT (locations_id) DO UPDATE
                SET name = EXCLUDED.name
                WHERE model_locations.name IS NULL AND EXCLUDED.name IS NOT NULL
        "#,
    },
    Population {
        dimension: Dimension::Location,
        source: "stage_carelogs",
        sql: r#"
            INSERT INTO model_locations (locations_id)
            SELECT DISTINCT locations_id
            FROM stage_carelogs
            WHERE locations_id IS NOT NULL
            ORDER BY locations_id
            ON CONFLICT (locations_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::Franchisor,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_franchisor (franchisor_id)
            SELECT DISTINCT franchisor_id
            FROM stage_caregivers
            WHERE franchisor_id IS NOT NULL
            ORDER BY franchisor_id
            ON CONFLICT (franchisor_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::Franchisor,
        source: "stage_carelogs",
        sql: r#"
            INSERT INTO model_franchisor (franchisor_id)
            SELECT DISTINCT franchisor_id
            FROM stage_carelogs
            WHERE franchisor_id IS NOT NULL
            ORDER BY franchisor_id
            ON CONFLICT (franchisor_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::Agency,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_agency (agency_id)
            SELECT DISTINCT agency_id
            FROM stage_caregivers
            WHERE agency_id IS NOT NULL
            ORDER BY agency_id
            ON CONFLICT (agency_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::Agency,
        source: "stage_carelogs",
        sql: r#"
            INSERT INTO model_agency (agency_id)
            SELECT DISTINCT agency_id
            FROM stage_carelogs
            WHERE agency_id IS NOT NULL
            ORDER BY agency_id
            ON CONFLICT (agency_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::Profile,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_profile (profile_id)
            SELECT DISTINCT profile_id
            FROM stage_caregivers
            WHERE profile_id IS NOT NULL
            ORDER BY profile_id
            ON CONFLICT (profile_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::ExternalIdentifier,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_external_identifier (external_id)
            SELECT DISTINCT external_id
            FROM stage_caregivers
            WHERE external_id IS NOT NULL
            ORDER BY external_id
            ON CONFLICT (external_id) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::ApplicantStatus,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_applicant_status (applicant_status)
            SELECT DISTINCT applicant_status
            FROM stage_caregivers
            WHERE applicant_status IS NOT NULL
            ORDER BY applicant_status
            ON CONFLICT (applicant_status) DO NOTHING
        "#,
    },
    Population {
        dimension: Dimension::EmploymentStatus,
        source: "stage_caregivers",
        sql: r#"
            INSERT INTO model_employment_status (employment_status)
            SELECT DISTINCT status
            FROM stage_caregivers
            WHERE status IS NOT NULL
            ORDER BY status
            ON CONFLICT (employment_status) DO NOTHING
        "#,
    },
];

/// Rows written per dimension during one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionStats {
    written: BTreeMap<Dimension, u64>,
}

impl DimensionStats {
    pub fn written(&self, dimension: Dimension) -> u64 {
        self.written.get(&dimension).copied().unwrap_or(0)
    }

    fn record(&mut self, dimension: Dimension, rows: u64) {
        *self.written.entry(dimension).or_default() += rows;
    }
}

/// Populates the dimension tables from staging
pub struct DimensionResolver {
    db: PgPool,
}

impl DimensionResolver {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Insert every distinct staged value missing from its dimension.
    ///
    /// Statements run outside any explicit transaction, each committing on
    /// its own.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Result<DimensionStats> {
        let mut stats = DimensionStats::default();

        for population in POPULATIONS {
            let result = sqlx::query(population.sql)
                .execute(&self.db)
                .await
                .db_context(format!(
                    "populating {} from {}",
                    population.dimension, population.source
                ))?;

            debug!(
                dimension = %population.dimension,
                source = population.source,
                rows = result.rows_affected(),
                "Dimension populated"
            );
            stats.record(population.dimension, result.rows_affected());
        }

        for dimension in Dimension::ALL {
            info!(dimension = %dimension, rows = stats.written(dimension), "Dimension resolved");
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dimension_is_populated() {
        for dimension in Dimension::ALL {
            assert!(
                POPULATIONS.iter().any(|p| p.dimension == dimension),
                "{dimension} has no population statement"
            );
        }
    }

    #[test]
    fn test_caregivers_feed_shared_dimensions_first() {
        for dimension in [Dimension::Location, Dimension::Franchisor, Dimension::Agency] {
            let sources: Vec<_> = POPULATIONS
                .iter()
                .filter(|p| p.dimension == dimension)
                .map(|p| p.source)
                .collect();
            assert_eq!(sources, vec!["stage_caregivers", "stage_carelogs"]);
        }
    }

    #[test]
    fn test_status_dimensions_come_from_caregivers_only() {
        for dimension in [
            Dimension::Profile,
            Dimension::ExternalIdentifier,
            Dimension::ApplicantStatus,
            Dimension::EmploymentStatus,
        ] {
            assert!(POPULATIONS
                .iter()
                .filter(|p| p.dimension == dimension)
                .all(|p| p.source == "stage_caregivers"));
        }
    }

    #[test]
    fn test_stats_accumulate_per_dimension() {
        let mut stats = DimensionStats::default();
        stats.record(Dimension::Agency, 2);
        stats.record(Dimension::Agency, 3);
        assert_eq!(stats.written(Dimension::Agency), 5);
        assert_eq!(stats.written(Dimension::Profile), 0);
    }
}
