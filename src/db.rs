use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{DiagnosisRecord, PatientSummary, RiskClass};
use crate::pipeline::Diagnosis;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Pool that opens connections on first use. Used where storage is
/// best-effort, so an unreachable server surfaces as a failed write.
pub fn connect_lazy(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)
        .context("invalid DATABASE_URL")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn add_patient(pool: &PgPool, full_name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO cardio_risk.patients (id, full_name)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Stores a completed diagnosis. Only called once the whole pipeline has
/// succeeded, so no partial record is ever written.
pub async fn save_diagnosis(
    pool: &PgPool,
    patient_id: Option<Uuid>,
    diagnosis: &Diagnosis,
) -> anyhow::Result<Uuid> {
    let observation = &diagnosis.observation;
    let assessment = &diagnosis.assessment;
    let features: Vec<i16> = diagnosis
        .features
        .as_slice()
        .iter()
        .map(|&bucket| i16::from(bucket))
        .collect();

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO cardio_risk.diagnoses
        (id, patient_id, age, sex_text, systolic, diastolic, cholesterol, glucose,
         smoker, alcohol, activity_text, bmi, features, risk_class, confidence, label)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(patient_id)
    .bind(observation.age)
    .bind(&observation.sex_text)
    .bind(observation.systolic)
    .bind(observation.diastolic)
    .bind(observation.cholesterol)
    .bind(observation.glucose)
    .bind(observation.smoker)
    .bind(observation.alcohol)
    .bind(&observation.activity_text)
    .bind(diagnosis.bmi)
    .bind(features)
    .bind(i16::from(assessment.risk_class.index()))
    .bind(assessment.confidence)
    .bind(&assessment.label)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Clinician listing: every patient with their diagnosis count and latest date.
pub async fn fetch_patients(pool: &PgPool) -> anyhow::Result<Vec<PatientSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.full_name,
               COUNT(d.id) AS diagnosis_count,
               MAX(d.created_at) AS last_diagnosis_at
        FROM cardio_risk.patients p
        LEFT JOIN cardio_risk.diagnoses d ON d.patient_id = p.id
        GROUP BY p.id, p.full_name
        ORDER BY p.full_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let patients = rows
        .into_iter()
        .map(|row| PatientSummary {
            patient_id: row.get("id"),
            full_name: row.get("full_name"),
            diagnosis_count: row.get("diagnosis_count"),
            last_diagnosis_at: row.get("last_diagnosis_at"),
        })
        .collect();

    Ok(patients)
}

pub async fn fetch_patient_name(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT full_name FROM cardio_risk.patients WHERE id = $1")
        .bind(patient_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| row.get("full_name")))
}

/// A patient's diagnoses, newest first.
pub async fn fetch_diagnoses(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<Vec<DiagnosisRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, patient_id, age, sex_text, systolic, diastolic, cholesterol, glucose,
               smoker, alcohol, activity_text, bmi, risk_class, confidence, created_at
        FROM cardio_risk.diagnoses
        WHERE patient_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    let mut diagnoses = Vec::with_capacity(rows.len());
    for row in rows {
        let raw_class: i16 = row.get("risk_class");
        let risk_class = usize::try_from(raw_class)
            .ok()
            .and_then(RiskClass::from_index)
            .with_context(|| format!("stored risk class {raw_class} is out of range"))?;

        diagnoses.push(DiagnosisRecord {
            diagnosis_id: row.get("id"),
            patient_id: row.get("patient_id"),
            age: row.get("age"),
            sex_text: row.get("sex_text"),
            systolic: row.get("systolic"),
            diastolic: row.get("diastolic"),
            cholesterol: row.get("cholesterol"),
            glucose: row.get("glucose"),
            smoker: row.get("smoker"),
            alcohol: row.get("alcohol"),
            activity_text: row.get("activity_text"),
            bmi: row.get("bmi"),
            risk_class,
            confidence: row.get("confidence"),
            created_at: row.get("created_at"),
        });
    }

    Ok(diagnoses)
}
