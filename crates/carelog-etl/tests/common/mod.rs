//! Shared fixtures for the database-backed pipeline tests
#![allow(dead_code)]

use carelog_etl::config::SourcePaths;
use carelog_etl::staging::StagingLoader;
use sqlx::PgPool;
use std::io::Write;
use tempfile::NamedTempFile;

pub const CAREGIVER_HEADER: &str = "franchisor_id,agency_id,subdomain,profile_id,caregiver_id,\
applicant,birthday_date,onboarding_date,location_name,locations_id,applicant_status,status,external_id";

pub const CARELOG_HEADER: &str = "franchisor_id,agency_id,carelog_id,parent_id,caregiver_id,\
start_datetime,end_datetime,clock_in_actual_datetime,clock_out_actual_datetime,\
clock_in_method,clock_out_method,status,split,general_comment_char_count";

/// Write a CSV fixture with the given header and data lines
pub fn csv_file(header: &str, rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    writeln!(file, "{}", header).expect("write header");
    for row in rows {
        writeln!(file, "{}", row).expect("write row");
    }
    file.flush().expect("flush csv");
    file
}

pub fn caregivers_csv(rows: &[&str]) -> NamedTempFile {
    csv_file(CAREGIVER_HEADER, rows)
}

pub fn carelogs_csv(rows: &[&str]) -> NamedTempFile {
    csv_file(CARELOG_HEADER, rows)
}

pub fn loader(pool: &PgPool) -> StagingLoader {
    StagingLoader::new(pool.clone()).with_spinner(false)
}

pub fn sources(caregivers: &NamedTempFile, carelogs: &NamedTempFile) -> SourcePaths {
    SourcePaths {
        caregivers: caregivers.path().to_path_buf(),
        carelogs: carelogs.path().to_path_buf(),
    }
}

/// Caregivers covering active, terminated, mis-cased and missing statuses
pub fn sample_caregivers() -> NamedTempFile {
    caregivers_csv(&[
        "F1,A1,north,P1,CG1,true,1980-01-02,2020-05-01,North Office,L1,hired,active,EXT1",
        "F1,A1,north,P2,CG2,false,,,,L1,hired,terminated,",
        "F1,A2,south,P3,CG3,yes,,,South Office,L2,applicant,Active,EXT3",
        "F2,A3,,P4,CG4,,,,,,,,",
        ",A1,,,,true,,,,,,active,",
    ])
}

/// Visits where a child precedes its parent and one caregiver is unknown
pub fn sample_carelogs() -> NamedTempFile {
    carelogs_csv(&[
        "F1,A1,CL2,CL1,CG1,2025-04-01 08:00:00,2025-04-01 10:00:00,2025-04-01 08:05:00,2025-04-01 09:55:00,gps,gps,2,t,12",
        "F1,A1,CL1,,CG1,2025-04-01 08:00:00,2025-04-01 12:00:00,,,mobile,mobile,2,f,0",
        "F1,A9,CL3,,CG2,2025-04-02 08:00:00,2025-04-02 09:00:00,,,,,1,,",
        "F1,A1,CL4,,CGX,2025-04-03 08:00:00,2025-04-03 09:00:00,,,,,1,,",
        "F1,A1,CL5,,,2025-04-03 08:00:00,2025-04-03 09:00:00,,,,,1,,",
        "F1,A1,,,CG1,2025-04-03 08:00:00,2025-04-03 09:00:00,,,,,1,,",
    ])
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows")
}
