//! Transactional staging loader
//!
//! One call stages one source file inside one transaction: either every
//! keyed record of the file is written, or nothing is.

use indicatif::{ProgressBar, ProgressStyle};
use sqlx::{PgPool, Postgres, Transaction};
use std::path::Path;
use tokio::fs::File;
use tracing::{debug, error, info, instrument, warn};

use super::models::{StagedCareVisit, StagedCaregiver, StagedRow};
use super::{EntityKind, StageCounts, StageStats};
use crate::config::DEFAULT_PROGRESS_INTERVAL;
use crate::error::{DbContext, Result};
use crate::reader::RecordStream;

/// Loads CSV extracts into the staging tables
pub struct StagingLoader {
    db: PgPool,
    progress_interval: u64,
    show_progress: bool,
}

impl StagingLoader {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            show_progress: true,
        }
    }

    /// Log a progress line every `interval` records (0 disables)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Toggle the terminal spinner
    pub fn with_spinner(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stage one source file.
    ///
    /// Records without a natural key are counted in `skipped` and never
    /// written. Any parse or write failure rolls back the whole file.
    #[instrument(skip(self), fields(kind = %kind, source = %source.display()))]
    pub async fn load(&self, source: &Path, kind: EntityKind) -> Result<StageStats> {
        match kind {
            EntityKind::Caregiver => self.load_rows::<StagedCaregiver>(source).await,
            EntityKind::CareVisit => self.load_rows::<StagedCareVisit>(source).await,
        }
    }

    async fn load_rows<T: StagedRow>(&self, source: &Path) -> Result<StageStats> {
        let kind = T::KIND;
        let mut records = RecordStream::open(source).await?;

        if !records.has_column(kind.natural_key()) {
            warn!(
                column = kind.natural_key(),
                "Source has no natural key column, every record will be skipped"
            );
        }

        let mut tx = self
            .db
            .begin()
            .await
            .db_context(format!("beginning {} staging transaction", kind))?;

        let progress = self.spinner(kind);
        let mut stats = StageStats::default();

        let outcome = self
            .write_records::<T>(&mut tx, &mut records, &mut stats, &progress)
            .await;
        progress.finish_and_clear();

        if let Err(e) = outcome {
            error!(
                error = %e,
                records_read = records.records_read(),
                "{} load failed, rolling back", kind
            );
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            return Err(e);
        }

        tx.commit()
            .await
            .db_context(format!("committing {} staging transaction", kind))?;

        info!(
            inserted_or_updated = stats.inserted_or_updated,
            skipped = stats.skipped,
            "{} staging complete", kind
        );

        Ok(stats)
    }

    async fn write_records<T: StagedRow>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        records: &mut RecordStream<File>,
        stats: &mut StageStats,
        progress: &ProgressBar,
    ) -> Result<()> {
        while let Some(record) = records.next_record().await? {
            match T::from_record(&record) {
                Some(row) => {
                    row.upsert(&mut **tx)
                        .await
                        .with_db_context(|| {
                            format!("upserting {} '{}'", T::KIND, row.natural_key())
                        })?;
                    stats.inserted_or_updated += 1;
                },
                None => {
                    stats.skipped += 1;
                    debug!(record = records.records_read(), "Skipping record without natural key");
                },
            }

            progress.inc(1);
            if self.progress_interval > 0 && stats.total() % self.progress_interval == 0 {
                info!(
                    processed = stats.total(),
                    inserted_or_updated = stats.inserted_or_updated,
                    skipped = stats.skipped,
                    "Staging {} in progress", T::KIND
                );
            }
        }

        Ok(())
    }

    fn spinner(&self, kind: EntityKind) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg} {pos} records")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("staging {}", kind));
        pb
    }

    /// Current row counts of both staging tables
    pub async fn counts(&self) -> Result<StageCounts> {
        stage_counts(&self.db).await
    }
}

pub(crate) async fn stage_counts(db: &PgPool) -> Result<StageCounts> {
    sqlx::query_as::<_, StageCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM stage_caregivers) AS caregivers,
            (SELECT COUNT(*) FROM stage_carelogs) AS carelogs
        "#,
    )
    .fetch_one(db)
    .await
    .db_context("counting staging rows")
}
