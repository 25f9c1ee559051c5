//! End-to-end pipeline: stage both extracts, then normalize
//!
//! Stages run strictly one after another on a single shared pool. The
//! caregiver extract is always staged before the care-visit extract.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::config::SourcePaths;
use crate::error::{DbContext, Result};
use crate::normalize::{ModelTransformer, NormalizeReport};
use crate::staging::{EntityKind, StageCounts, StageStats, StagingLoader};

/// Outcome of staging both extracts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub caregivers: StageStats,
    pub care_visits: StageStats,
    pub counts: StageCounts,
}

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub staging: StageReport,
    pub normalize: NormalizeReport,
}

#[derive(Debug, sqlx::FromRow)]
struct ConnectionInfo {
    database: String,
    username: String,
}

pub struct Pipeline {
    db: PgPool,
    loader: StagingLoader,
    transformer: ModelTransformer,
}

impl Pipeline {
    pub fn new(db: PgPool) -> Self {
        Self {
            loader: StagingLoader::new(db.clone()),
            transformer: ModelTransformer::new(db.clone()),
            db,
        }
    }

    /// Replace the staging loader, e.g. to tune progress reporting
    pub fn with_loader(mut self, loader: StagingLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Log which database and role the pool is connected as
    pub async fn describe_connection(&self) -> Result<()> {
        let info = sqlx::query_as::<_, ConnectionInfo>(
            "SELECT current_database()::text AS database, current_user::text AS username",
        )
        .fetch_one(&self.db)
        .await
        .db_context("querying connection info")?;

        info!(database = %info.database, user = %info.username, "Connected");
        Ok(())
    }

    /// Stage caregivers, then care-visits, each in its own transaction.
    ///
    /// A care-visit failure does not undo the committed caregiver load.
    #[instrument(skip(self, sources))]
    pub async fn stage(&self, sources: &SourcePaths) -> Result<StageReport> {
        let caregivers = self
            .loader
            .load(&sources.caregivers, EntityKind::Caregiver)
            .await?;
        let care_visits = self
            .loader
            .load(&sources.carelogs, EntityKind::CareVisit)
            .await?;
        let counts = self.loader.counts().await?;

        info!(
            stage_caregivers = counts.caregivers,
            stage_carelogs = counts.carelogs,
            "Staging tables loaded"
        );

        Ok(StageReport {
            caregivers,
            care_visits,
            counts,
        })
    }

    pub async fn normalize(&self) -> Result<NormalizeReport> {
        self.transformer.run().await
    }

    /// Stage both extracts and rebuild the model
    pub async fn run(&self, sources: &SourcePaths) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let staging = self.stage(sources).await?;
        let normalize = self.normalize().await?;
        let finished_at = Utc::now();

        info!(
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            model_caregivers = normalize.counts.caregivers,
            model_care_visits = normalize.counts.care_visits,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            started_at,
            finished_at,
            staging,
            normalize,
        })
    }
}
