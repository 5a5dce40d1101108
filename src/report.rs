use std::fmt::Write;

use uuid::Uuid;

use crate::models::{DiagnosisRecord, PatientSummary, RiskClass, RiskClassSummary};

pub fn summarize_by_class(diagnoses: &[DiagnosisRecord]) -> Vec<RiskClassSummary> {
    let mut summaries = Vec::new();

    for risk_class in RiskClass::ALL {
        let confidences: Vec<f64> = diagnoses
            .iter()
            .filter(|diagnosis| diagnosis.risk_class == risk_class)
            .map(|diagnosis| diagnosis.confidence)
            .collect();
        if confidences.is_empty() {
            continue;
        }
        summaries.push(RiskClassSummary {
            risk_class,
            count: confidences.len(),
            avg_confidence: confidences.iter().sum::<f64>() / confidences.len() as f64,
        });
    }

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn render_patient_list(patients: &[PatientSummary]) -> String {
    let mut output = String::new();

    if patients.is_empty() {
        let _ = writeln!(output, "No patients registered.");
        return output;
    }

    for patient in patients {
        let last = patient
            .last_diagnosis_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(
            output,
            "- {} ({}) {} diagnoses, last {}",
            patient.full_name, patient.patient_id, patient.diagnosis_count, last
        );
    }

    output
}

/// Markdown history for one patient. `diagnoses` is expected newest first.
pub fn build_history_report(
    patient_name: &str,
    patient_id: Uuid,
    diagnoses: &[DiagnosisRecord],
) -> String {
    let summaries = summarize_by_class(diagnoses);
    let mut output = String::new();

    let _ = writeln!(output, "# Cardiovascular Risk History");
    let _ = writeln!(output, "Patient: {} ({})", patient_name, patient_id);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No diagnoses recorded for this patient.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} diagnoses (avg confidence {:.2}%)",
                summary.risk_class.label(),
                summary.count,
                summary.avg_confidence
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Diagnoses");

    if diagnoses.is_empty() {
        let _ = writeln!(output, "No diagnoses recorded for this patient.");
    } else {
        for diagnosis in diagnoses {
            let _ = writeln!(
                output,
                "- {}: {} risk ({:.2}%) age {}, BP {}/{}, cholesterol {:.0}, glucose {:.0}, BMI {:.1}, smoker {}, alcohol {}, activity \"{}\"",
                diagnosis.created_at.format("%Y-%m-%d %H:%M"),
                diagnosis.risk_class.label(),
                diagnosis.confidence,
                diagnosis.age,
                diagnosis.systolic,
                diagnosis.diastolic,
                diagnosis.cholesterol,
                diagnosis.glucose,
                diagnosis.bmi,
                yes_no(diagnosis.smoker),
                yes_no(diagnosis.alcohol),
                diagnosis.activity_text
            );
        }
    }

    output
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
