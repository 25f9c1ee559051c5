//! Staging -> normalized model transformation
//!
//! Normalization is a full recompute. Each run walks the same steps:
//!
//! 1. truncate every model table
//! 2. repopulate the dimensions
//! 3. upsert caregivers (committed on its own)
//! 4. upsert care-visits in one transaction with deferred foreign keys
//! 5. report the final fact table counts
//!
//! A failure in step 4 rolls back only the care-visit transaction, leaving
//! dimensions and caregivers in place. Running again starts over at step 1.

use sqlx::PgPool;
use tracing::{error, info, instrument};

use super::dimensions::{DimensionResolver, DimensionStats};
use crate::error::{DbContext, Result};
use crate::staging::loader::stage_counts;

/// Employment status that marks a caregiver as active (exact match)
pub const ACTIVE_STATUS: &str = "active";

/// Row counts of the model fact tables after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct ModelCounts {
    pub caregivers: i64,
    pub care_visits: i64,
}

/// Outcome of one normalization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub dimensions: DimensionStats,
    pub caregivers_written: u64,
    pub care_visits_written: u64,
    pub counts: ModelCounts,
}

const TRUNCATE_MODEL: &str = r#"
    TRUNCATE
        model_carevisit,
        model_caregiver,
        model_applicant_status,
        model_employment_status,
        model_external_identifier,
        model_profile,
        model_agency,
        model_franchisor,
        model_locations
    RESTART IDENTITY CASCADE
"#;

const UPSERT_CAREGIVERS: &str = r#"
    INSERT INTO model_caregiver (
        caregiver_id,
        franchisor_id,
        agency_id,
        locations_id,
        profile_id,
        external_id,
        applicant_status_id,
        employment_status_id,
        applicant,
        is_active
    )
    SELECT
        sc.caregiver_id,
        sc.franchisor_id,
        sc.agency_id,
        sc.locations_id,
        sc.profile_id,
        sc.external_id,
        mas.applicant_status_id,
        mes.employment_status_id,
        sc.applicant,
        COALESCE(mes.employment_status = $1, FALSE)
    FROM stage_caregivers sc
    LEFT JOIN model_applicant_status mas
        ON mas.applicant_status = sc.applicant_status
    LEFT JOIN model_employment_status mes
        ON mes.employment_status = sc.status
    WHERE sc.caregiver_id IS NOT NULL
    ON CONFLICT (caregiver_id) DO UPDATE SET
        franchisor_id = EXCLUDED.franchisor_id,
        agency_id = EXCLUDED.agency_id,
        locations_id = EXCLUDED.locations_id,
        profile_id = EXCLUDED.profile_id,
        external_id = EXCLUDED.external_id,
        applicant_status_id = EXCLUDED.applicant_status_id,
        employment_status_id = EXCLUDED.employment_status_id,
        applicant = EXCLUDED.applicant,
        is_active = EXCLUDED.is_active
"#;

// Visits whose caregiver did not make it into model_caregiver are left out.
// A parent outside the eligible set is stored as NULL.
const UPSERT_CARE_VISITS: &str = r#"
    WITH eligible AS (
        SELECT cl.*
        FROM stage_carelogs cl
        JOIN model_caregiver mc ON mc.caregiver_id = cl.caregiver_id
        WHERE cl.carelog_id IS NOT NULL
          AND cl.caregiver_id IS NOT NULL
    )
    INSERT INTO model_carevisit (
        carelog_id,
        caregiver_id,
        agency_id,
        franchisor_id,
        locations_id,
        parent_id,
        start_at,
        end_at,
        in_at,
        out_at,
        clock_in_method,
        clock_out_method,
        status_code,
        is_split,
        comment_chars
    )
    SELECT
        e.carelog_id,
        e.caregiver_id,
        e.agency_id,
        e.franchisor_id,
        e.locations_id,
        parent.carelog_id,
        e.start_datetime,
        e.end_datetime,
        e.clock_in_actual_datetime,
        e.clock_out_actual_datetime,
        e.clock_in_method,
        e.clock_out_method,
        e.status,
        e.split,
        e.general_comment_char_count
    FROM eligible e
    LEFT JOIN eligible parent ON parent.carelog_id = e.parent_id
    ON CONFLICT (carelog_id) DO UPDATE SET
        caregiver_id = EXCLUDED.caregiver_id,
        agency_id = EXCLUDED.agency_id,
        franchisor_id = EXCLUDED.franchisor_id,
        locations_id = EXCLUDED.locations_id,
        parent_id = EXCLUDED.parent_id,
        start_at = EXCLUDED.start_at,
        end_at = EXCLUDED.end_at,
        in_at = EXCLUDED.in_at,
        out_at = EXCLUDED.out_at,
        clock_in_method = EXCLUDED.clock_in_method,
        clock_out_method = EXCLUDED.clock_out_method,
        status_code = EXCLUDED.status_code,
        is_split = EXCLUDED.is_split,
        comment_chars = EXCLUDED.comment_chars
"#;

/// Rebuilds the normalized model from the staging tables
pub struct ModelTransformer {
    db: PgPool,
    dimensions: DimensionResolver,
}

impl ModelTransformer {
    pub fn new(db: PgPool) -> Self {
        let dimensions = DimensionResolver::new(db.clone());
        Self { db, dimensions }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<NormalizeReport> {
        let staged = stage_counts(&self.db).await?;
        info!(
            stage_caregivers = staged.caregivers,
            stage_carelogs = staged.carelogs,
            "Starting normalization"
        );

        self.reset().await?;
        let dimensions = self.dimensions.resolve().await?;
        let caregivers_written = self.upsert_caregivers().await?;
        let care_visits_written = self.upsert_care_visits().await?;
        let counts = self.counts().await?;

        info!(
            caregivers = counts.caregivers,
            care_visits = counts.care_visits,
            "Normalization complete"
        );

        Ok(NormalizeReport {
            dimensions,
            caregivers_written,
            care_visits_written,
            counts,
        })
    }

    /// Empty every model table and restart surrogate key sequences
    pub async fn reset(&self) -> Result<()> {
        sqlx::query(TRUNCATE_MODEL)
            .execute(&self.db)
            .await
            .db_context("truncating model tables")?;
        info!("Model tables reset");
        Ok(())
    }

    async fn upsert_caregivers(&self) -> Result<u64> {
        let result = sqlx::query(UPSERT_CAREGIVERS)
            .bind(ACTIVE_STATUS)
            .execute(&self.db)
            .await
            .db_context("upserting model caregivers")?;

        info!(rows = result.rows_affected(), "Caregivers upserted");
        Ok(result.rows_affected())
    }

    async fn upsert_care_visits(&self) -> Result<u64> {
        let mut tx = self
            .db
            .begin()
            .await
            .db_context("beginning care-visit transaction")?;

        let outcome = async {
            // Parent visits may follow their children within the batch
            sqlx::query("SET CONSTRAINTS ALL DEFERRED")
                .execute(&mut *tx)
                .await
                .db_context("deferring constraints")?;

            sqlx::query(UPSERT_CARE_VISITS)
                .execute(&mut *tx)
                .await
                .db_context("upserting model care-visits")
        }
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Care-visit load failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            },
        };

        // Deferred foreign keys are checked here
        tx.commit()
            .await
            .db_context("committing care-visit transaction")?;

        info!(rows = result.rows_affected(), "Care-visits upserted");
        Ok(result.rows_affected())
    }

    /// Current row counts of the model fact tables
    pub async fn counts(&self) -> Result<ModelCounts> {
        sqlx::query_as::<_, ModelCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM model_caregiver) AS caregivers,
                (SELECT COUNT(*) FROM model_carevisit) AS care_visits
            "#,
        )
        .fetch_one(&self.db)
        .await
        .db_context("counting model rows")
    }
}
