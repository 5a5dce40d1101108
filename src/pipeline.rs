use std::collections::HashMap;

use crate::classifier::RiskClassifier;
use crate::encode::{body_mass_index, encode};
use crate::error::DiagnosisError;
use crate::interpret::interpret;
use crate::models::{ClinicalObservation, FeatureVector, RiskAssessment};
use crate::validate::validate_submission;

/// Everything produced for one submission, for callers that persist it.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub observation: ClinicalObservation,
    pub bmi: f64,
    pub features: FeatureVector,
    pub assessment: RiskAssessment,
}

/// validate -> encode -> classify -> interpret. Holds no per-request state.
#[derive(Clone)]
pub struct RiskPipeline {
    classifier: RiskClassifier,
}

impl RiskPipeline {
    pub fn new(classifier: RiskClassifier) -> Self {
        Self { classifier }
    }

    pub fn assess(&self, form: &HashMap<String, String>) -> Result<RiskAssessment, DiagnosisError> {
        self.diagnose(form).map(|diagnosis| diagnosis.assessment)
    }

    pub fn diagnose(&self, form: &HashMap<String, String>) -> Result<Diagnosis, DiagnosisError> {
        let observation = validate_submission(form)?;
        let features = encode(&observation)?;
        let probabilities = self.classifier.classify(&features)?;
        let assessment = interpret(&probabilities);

        tracing::debug!(
            features = ?features.as_slice(),
            probabilities = ?probabilities.0,
            "submission classified"
        );
        tracing::info!(
            risk = assessment.label.as_str(),
            confidence = assessment.confidence,
            "risk assessed"
        );

        Ok(Diagnosis {
            bmi: body_mass_index(observation.weight, observation.height),
            observation,
            features,
            assessment,
        })
    }
}
