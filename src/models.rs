use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FEATURE_COUNT: usize = 10;
pub const RISK_CLASS_COUNT: usize = 3;

/// Largest category any encoded feature may take.
pub const MAX_BUCKET: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    Inactive,
    Low,
    High,
}

/// One validated form submission. Raw text of the categorical fields is kept
/// so the caller can store exactly what was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalObservation {
    pub age: i32,
    pub sex: Sex,
    pub sex_text: String,
    pub systolic: i32,
    pub diastolic: i32,
    pub cholesterol: f64,
    pub glucose: f64,
    pub smoker: bool,
    pub alcohol: bool,
    pub activity: ActivityLevel,
    pub activity_text: String,
    pub weight: f64,
    pub height: i32,
}

/// Categorical encoding in the order the classifier was trained on:
/// age, sex, systolic, diastolic, cholesterol, glucose, smoker, alcohol,
/// activity, bmi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector(pub [u8; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_model_input(&self) -> Vec<f32> {
        self.0.iter().map(|&bucket| f32::from(bucket)).collect()
    }
}

/// Serialized as its class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskClass {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl RiskClass {
    pub const ALL: [RiskClass; RISK_CLASS_COUNT] =
        [RiskClass::Low, RiskClass::Medium, RiskClass::High];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskClass::Low => "Low",
            RiskClass::Medium => "Medium",
            RiskClass::High => "High",
        }
    }
}

impl From<RiskClass> for u8 {
    fn from(risk_class: RiskClass) -> Self {
        risk_class.index()
    }
}

impl TryFrom<u8> for RiskClass {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        RiskClass::from_index(usize::from(index))
            .ok_or_else(|| format!("unknown risk class {index}"))
    }
}

/// Classifier output, indexed by risk class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassProbabilities(pub [f32; RISK_CLASS_COUNT]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_class: RiskClass,
    /// Percentage in 0..=100, two decimals.
    pub confidence: f64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct PatientSummary {
    pub patient_id: Uuid,
    pub full_name: String,
    pub diagnosis_count: i64,
    pub last_diagnosis_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DiagnosisRecord {
    pub diagnosis_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub age: i32,
    pub sex_text: String,
    pub systolic: i32,
    pub diastolic: i32,
    pub cholesterol: f64,
    pub glucose: f64,
    pub smoker: bool,
    pub alcohol: bool,
    pub activity_text: String,
    pub bmi: f64,
    pub risk_class: RiskClass,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RiskClassSummary {
    pub risk_class: RiskClass,
    pub count: usize,
    pub avg_confidence: f64,
}
