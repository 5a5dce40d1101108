use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;
use uuid::Uuid;

use crate::error::DiagnosisError;
use crate::pipeline::{Diagnosis, RiskPipeline};

/// Why a single CSV row produced no diagnosis. Never aborts the batch.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("malformed CSV record: {0}")]
    Malformed(String),

    #[error("invalid patient_id {0:?}")]
    PatientId(String),

    #[error(transparent)]
    Diagnosis(#[from] DiagnosisError),
}

impl RowError {
    pub fn user_message(&self) -> String {
        match self {
            RowError::Diagnosis(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Submission {
    pub line: u64,
    pub patient_id: Option<Uuid>,
    pub form: Result<HashMap<String, String>, RowError>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub line: u64,
    pub patient_id: Option<Uuid>,
    pub result: Result<Diagnosis, RowError>,
}

/// Reads one submission per CSV row. Headers are the form keys plus an
/// optional `patient_id` column. Only an unreadable file or header line fails
/// the whole read; a bad row is kept as a rejected submission.
pub fn read_submissions(csv_path: &Path) -> anyhow::Result<Vec<Submission>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let headers = reader.headers()?.clone();
    let mut submissions = Vec::new();

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let io_failure = err.is_io_error();
                submissions.push(Submission {
                    line: err.position().map_or(0, |position| position.line()),
                    patient_id: None,
                    form: Err(RowError::Malformed(err.to_string())),
                });
                if io_failure {
                    break;
                }
                continue;
            }
        };
        let line = record.position().map_or(0, |position| position.line());
        submissions.push(parse_row(line, &record, &headers));
    }

    Ok(submissions)
}

fn parse_row(line: u64, record: &csv::StringRecord, headers: &csv::StringRecord) -> Submission {
    let mut form: HashMap<String, String> = match record.deserialize(Some(headers)) {
        Ok(form) => form,
        Err(err) => {
            return Submission {
                line,
                patient_id: None,
                form: Err(RowError::Malformed(err.to_string())),
            }
        }
    };

    let patient_id = match form.remove("patient_id") {
        Some(raw) if !raw.trim().is_empty() => match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                return Submission {
                    line,
                    patient_id: None,
                    form: Err(RowError::PatientId(raw)),
                }
            }
        },
        _ => None,
    };

    Submission {
        line,
        patient_id,
        form: Ok(form),
    }
}

/// Assesses every row on its own; a failing row does not stop the batch.
pub fn assess_all(pipeline: &RiskPipeline, submissions: Vec<Submission>) -> Vec<BatchOutcome> {
    submissions
        .into_iter()
        .map(|submission| {
            let result = submission
                .form
                .and_then(|form| pipeline.diagnose(&form).map_err(RowError::from));
            if let Err(err) = &result {
                tracing::warn!(line = submission.line, error = %err, "row rejected");
            }
            BatchOutcome {
                line: submission.line,
                patient_id: submission.patient_id,
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::classifier::{Activation, DenseLayer, DenseNetwork, RiskClassifier};
    use crate::models::{FeatureVector, RiskClass};

    const HEADER: &str =
        "patient_id,edad,genero,ps,pd,colesterol,glucosa,fuma,alcohol,actividad,peso,estatura";

    fn constant_pipeline() -> RiskPipeline {
        let network = DenseNetwork {
            name: "constant".to_string(),
            layers: vec![DenseLayer {
                weights: vec![vec![0.0; 10]; 3],
                bias: vec![0.0, 1.0, 0.0],
                activation: Activation::Softmax,
            }],
        };
        RiskPipeline::new(RiskClassifier::new(Arc::new(network)).expect("classifier"))
    }

    fn write_csv(rows: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let path = tmp.path().join("batch.csv");
        std::fs::write(&path, format!("{HEADER}\n{rows}")).expect("write");
        (tmp, path)
    }

    #[test]
    fn reads_rows_with_optional_patient() {
        let patient = Uuid::new_v4();
        let (_tmp, path) = write_csv(&format!(
            "{patient},50,masculino,145,95,250,130,s,n,no hace,90,170\n,38,Femenino,110,70,180,90,n,n,intensa,60,165\n"
        ));

        let submissions = read_submissions(&path).expect("read");

        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].patient_id, Some(patient));
        assert_eq!(submissions[0].line, 2);
        assert_eq!(submissions[1].patient_id, None);
        let form = submissions[1].form.as_ref().expect("second row");
        assert_eq!(form.get("genero").map(String::as_str), Some("Femenino"));
        assert!(!form.contains_key("patient_id"));
    }

    #[test]
    fn bad_patient_id_only_rejects_its_row() {
        let (_tmp, path) = write_csv(
            ",50,masculino,145,95,250,130,s,n,no hace,90,170\nnot-a-uuid,50,masculino,145,95,250,130,s,n,no hace,90,170\n",
        );

        let outcomes = assess_all(&constant_pipeline(), read_submissions(&path).expect("read"));

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(outcomes[1].line, 3);
        let err = outcomes[1].result.as_ref().unwrap_err();
        assert!(matches!(err, RowError::PatientId(raw) if raw == "not-a-uuid"));
        assert!(err.user_message().contains("not-a-uuid"));
    }

    #[test]
    fn short_record_only_rejects_its_row() {
        let (_tmp, path) = write_csv(
            ",50,masculino,145\n,38,Femenino,110,70,180,90,n,n,intensa,60,165\n",
        );

        let outcomes = assess_all(&constant_pipeline(), read_submissions(&path).expect("read"));

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].result, Err(RowError::Malformed(_))));
        assert_eq!(outcomes[0].line, 2);
        assert!(outcomes[1].result.is_ok());
    }

    #[test]
    fn failing_rows_do_not_stop_the_batch() {
        let (_tmp, path) = write_csv(
            ",50,masculino,145,95,250,130,s,n,no hace,90,170\n,50,masculino,alta,95,250,130,s,n,no hace,90,170\n,38,Femenino,110,70,180,90,n,n,intensa,60,165\n",
        );

        let outcomes = assess_all(&constant_pipeline(), read_submissions(&path).expect("read"));

        assert_eq!(outcomes.len(), 3);
        let first = outcomes[0].result.as_ref().expect("first row");
        assert_eq!(first.features, FeatureVector([1, 1, 2, 2, 2, 2, 1, 0, 2, 2]));
        assert_eq!(first.assessment.risk_class, RiskClass::Medium);

        let err = outcomes[1].result.as_ref().unwrap_err();
        assert!(matches!(err, RowError::Diagnosis(inner) if inner.is_validation()));
        assert_eq!(outcomes[1].line, 3);

        let third = outcomes[2].result.as_ref().expect("third row");
        assert_eq!(third.features, FeatureVector([0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn missing_file_fails_the_read() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        assert!(read_submissions(&tmp.path().join("absent.csv")).is_err());
    }
}
