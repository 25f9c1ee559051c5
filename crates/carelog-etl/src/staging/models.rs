//! Staged row types and their upsert statements
//!
//! Each source record is coerced into one of these rows. Timestamp and date
//! columns travel as text and are cast by Postgres, so a malformed value is
//! rejected by storage and aborts the load.

use async_trait::async_trait;
use sqlx::PgConnection;

use super::EntityKind;
use crate::coerce::{to_bool, to_int, to_nullable};
use crate::reader::RawRecord;

/// A row of a staging table, keyed by the source's natural identifier.
#[async_trait]
pub trait StagedRow: Sized + Send + Sync {
    const KIND: EntityKind;

    /// Coerce a raw record. `None` when the natural key is missing.
    fn from_record(record: &RawRecord) -> Option<Self>;

    fn natural_key(&self) -> &str;

    /// Insert the row, or overwrite every non-key column of an existing one.
    async fn upsert(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error>;
}

/// Caregiver profile as landed in `stage_caregivers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCaregiver {
    pub caregiver_id: String,
    pub franchisor_id: Option<String>,
    pub agency_id: Option<String>,
    pub subdomain: Option<String>,
    pub profile_id: Option<String>,
    pub external_id: Option<String>,
    pub applicant: Option<bool>,
    pub birthday_date: Option<String>,
    pub onboarding_date: Option<String>,
    pub locations_id: Option<String>,
    pub location_name: Option<String>,
    pub applicant_status: Option<String>,
    pub status: Option<String>,
}

#[async_trait]
impl StagedRow for StagedCaregiver {
    const KIND: EntityKind = EntityKind::Caregiver;

    fn from_record(record: &RawRecord) -> Option<Self> {
        let field = |name: &str| to_nullable(record.get(name));

        Some(Self {
            caregiver_id: field("caregiver_id")?,
            franchisor_id: field("franchisor_id"),
            agency_id: field("agency_id"),
            subdomain: field("subdomain"),
            profile_id: field("profile_id"),
            external_id: field("external_id"),
            applicant: to_bool(record.get("applicant")),
            birthday_date: field("birthday_date"),
            onboarding_date: field("onboarding_date"),
            locations_id: field("locations_id"),
            location_name: field("location_name"),
            applicant_status: field("applicant_status"),
            status: field("status"),
        })
    }

    fn natural_key(&self) -> &str {
        &self.caregiver_id
    }

    async fn upsert(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stage_caregivers (
                caregiver_id, franchisor_id, agency_id, subdomain, profile_id,
                external_id, applicant, birthday_date, onboarding_date,
                locations_id, location_name, applicant_status, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::date, $9::date, $10, $11, $12, $13)
            ON CONFLICT (caregiver_id) DO UPDATE SET
                franchisor_id = EXCLUDED.franchisor_id,
                agency_id = EXCLUDED.agency_id,
                subdomain = EXCLUDED.subdomain,
                profile_id = EXCLUDED.profile_id,
                external_id = EXCLUDED.external_id,
                applicant = EXCLUDED.applicant,
                birthday_date = EXCLUDED.birthday_date,
                onboarding_date = EXCLUDED.onboarding_date,
                locations_id = EXCLUDED.locations_id,
                location_name = EXCLUDED.location_name,
                applicant_status = EXCLUDED.applicant_status,
                status = EXCLUDED.status
            "#,
        )
        .bind(&self.caregiver_id)
        .bind(&self.franchisor_id)
        .bind(&self.agency_id)
        .bind(&self.subdomain)
        .bind(&self.profile_id)
        .bind(&self.external_id)
        .bind(self.applicant)
        .bind(&self.birthday_date)
        .bind(&self.onboarding_date)
        .bind(&self.locations_id)
        .bind(&self.location_name)
        .bind(&self.applicant_status)
        .bind(&self.status)
        .execute(conn)
        .await?;

        Ok(())
    }
}

/// Care-visit log entry as landed in `stage_carelogs`.
///
/// `caregiver_id` is not checked against staged caregivers here; orphans
/// are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCareVisit {
    pub carelog_id: String,
    pub franchisor_id: Option<String>,
    pub agency_id: Option<String>,
    pub locations_id: Option<String>,
    pub parent_id: Option<String>,
    pub caregiver_id: Option<String>,
    pub start_datetime: Option<String>,
    pub end_datetime: Option<String>,
    pub clock_in_actual_datetime: Option<String>,
    pub clock_out_actual_datetime: Option<String>,
    pub clock_in_method: Option<String>,
    pub clock_out_method: Option<String>,
    pub status: Option<String>,
    pub split: Option<bool>,
    pub general_comment_char_count: Option<i64>,
}

#[async_trait]
impl StagedRow for StagedCareVisit {
    const KIND: EntityKind = EntityKind::CareVisit;

    fn from_record(record: &RawRecord) -> Option<Self> {
        let field = |name: &str| to_nullable(record.get(name));

        Some(Self {
            carelog_id: field("carelog_id")?,
            franchisor_id: field("franchisor_id"),
            agency_id: field("agency_id"),
            locations_id: field("locations_id"),
            parent_id: field("parent_id"),
            caregiver_id: field("caregiver_id"),
            start_datetime: field("start_datetime"),
            end_datetime: field("end_datetime"),
            clock_in_actual_datetime: field("clock_in_actual_datetime"),
            clock_out_actual_datetime: field("clock_out_actual_datetime"),
            clock_in_method: field("clock_in_method"),
            clock_out_method: field("clock_out_method"),
            status: field("status"),
            split: to_bool(record.get("split")),
            general_comment_char_count: to_int(record.get("general_comment_char_count")),
        })
    }

    fn natural_key(&self) -> &str {
        &self.carelog_id
    }

    async fn upsert(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO stage_carelogs (
                carelog_id, franchisor_id, agency_id, locations_id, parent_id, caregiver_id,
                start_datetime, end_datetime,
                clock_in_actual_datetime, clock_out_actual_datetime,
                clock_in_method, clock_out_method, status, split, general_comment_char_count
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7::timestamp, $8::timestamp, $9::timestamp, $10::timestamp,
                $11, $12, $13, $14, $15
            )
            ON CONFLICT (carelog_id) DO UPDATE SET
                franchisor_id = EXCLUDED.franchisor_id,
                agency_id = EXCLUDED.agency_id,
                locations_id = EXCLUDED.locations_id,
                parent_id = EXCLUDED.parent_id,
                caregiver_id = EXCLUDED.caregiver_id,
                start_datetime = EXCLUDED.start_datetime,
                end_datetime = EXCLUDED.end_datetime,
                clock_in_actual_datetime = EXCLUDED.clock_in_actual_datetime,
                clock_out_actual_datetime = EXCLUDED.clock_out_actual_datetime,
                clock_in_method = EXCLUDED.clock_in_method,
                clock_out_method = EXCLUDED.clock_out_method,
                status = EXCLUDED.status,
                split = EXCLUDED.split,
                general_comment_char_count = EXCLUDED.general_comment_char_count
            "#,
        )
        .bind(&self.carelog_id)
        .bind(&self.franchisor_id)
        .bind(&self.agency_id)
        .bind(&self.locations_id)
        .bind(&self.parent_id)
        .bind(&self.caregiver_id)
        .bind(&self.start_datetime)
        .bind(&self.end_datetime)
        .bind(&self.clock_in_actual_datetime)
        .bind(&self.clock_out_actual_datetime)
        .bind(&self.clock_in_method)
        .bind(&self.clock_out_method)
        .bind(&self.status)
        .bind(self.split)
        .bind(self.general_comment_char_count)
        .execute(conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::reader::RecordStream;

    async fn first_record(data: &'static str) -> RawRecord {
        let mut stream = RecordStream::from_reader("inline.csv", data.as_bytes())
            .await
            .unwrap();
        stream.next_record().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_caregiver_coercion() {
        let record = first_record(
            "caregiver_id,agency_id,applicant,status,external_id,unused\nCG1,AG1,Yes,active,,x\n",
        )
        .await;

        let row = StagedCaregiver::from_record(&record).unwrap();
        assert_eq!(row.natural_key(), "CG1");
        assert_eq!(row.agency_id.as_deref(), Some("AG1"));
        assert_eq!(row.applicant, Some(true));
        assert_eq!(row.status.as_deref(), Some("active"));
        assert_eq!(row.external_id, None);
        assert_eq!(row.locations_id, None);
    }

    #[tokio::test]
    async fn test_caregiver_without_key_is_skipped() {
        let record = first_record("caregiver_id,status\n,active\n").await;
        assert!(StagedCaregiver::from_record(&record).is_none());

        let record = first_record("status\nactive\n").await;
        assert!(StagedCaregiver::from_record(&record).is_none());
    }

    #[tokio::test]
    async fn test_care_visit_coercion() {
        let record = first_record(
            "carelog_id,caregiver_id,parent_id,split,general_comment_char_count,status\n\
             CL2,CG1,CL1,f,abc,2\n",
        )
        .await;

        let row = StagedCareVisit::from_record(&record).unwrap();
        assert_eq!(row.natural_key(), "CL2");
        assert_eq!(row.caregiver_id.as_deref(), Some("CG1"));
        assert_eq!(row.parent_id.as_deref(), Some("CL1"));
        assert_eq!(row.split, Some(false));
        assert_eq!(row.general_comment_char_count, None);
        assert_eq!(row.status.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_care_visit_keeps_orphan_caregiver_reference() {
        let record = first_record("carelog_id,caregiver_id\nCL9,\n").await;
        let row = StagedCareVisit::from_record(&record).unwrap();
        assert_eq!(row.caregiver_id, None);
    }
}
