//! Categorical encoding of a clinical observation.
//!
//! Every feature is described by an ordered rule table evaluated first match
//! wins. The thresholds are the ones the classifier was fitted against and
//! must not be "tidied up": the BMI table in particular is not monotonic.

use std::fmt::Debug;

use crate::error::DiagnosisError;
use crate::models::{ActivityLevel, ClinicalObservation, FeatureVector, Sex};

pub struct Rule<T: ?Sized, O> {
    pub when: fn(&T) -> bool,
    pub then: O,
}

pub fn first_match<T: ?Sized, O: Copy>(rules: &[Rule<T, O>], value: &T) -> Option<O> {
    rules
        .iter()
        .find(|rule| (rule.when)(value))
        .map(|rule| rule.then)
}

pub const AGE_RULES: &[Rule<i32, u8>] = &[
    Rule { when: |age| *age < 45, then: 0 },
    Rule { when: |age| *age <= 59, then: 1 },
    Rule { when: |_| true, then: 2 },
];

pub const SYSTOLIC_RULES: &[Rule<i32, u8>] = &[
    Rule { when: |mmhg| *mmhg < 120, then: 0 },
    Rule { when: |mmhg| *mmhg <= 139, then: 1 },
    Rule { when: |_| true, then: 2 },
];

pub const DIASTOLIC_RULES: &[Rule<i32, u8>] = &[
    Rule { when: |mmhg| *mmhg < 80, then: 0 },
    Rule { when: |mmhg| *mmhg <= 89, then: 1 },
    Rule { when: |_| true, then: 2 },
];

pub const CHOLESTEROL_RULES: &[Rule<f64, u8>] = &[
    Rule { when: |mg| *mg < 200.0, then: 0 },
    Rule { when: |mg| *mg <= 239.0, then: 1 },
    Rule { when: |_| true, then: 2 },
];

pub const GLUCOSE_RULES: &[Rule<f64, u8>] = &[
    Rule { when: |mg| *mg < 100.0, then: 0 },
    Rule { when: |mg| *mg <= 125.0, then: 1 },
    Rule { when: |_| true, then: 2 },
];

// BMI 0 (no height) lands in the underweight bucket. This duplicate branch is
// probably a latent bug upstream of the trained model, but the model was fit
// with it, so it stays.
pub const BMI_RULES: &[Rule<f64, u8>] = &[
    Rule { when: |bmi| *bmi == 0.0, then: 1 },
    Rule { when: |bmi| *bmi < 18.5, then: 1 },
    Rule { when: |bmi| *bmi < 25.0, then: 0 },
    Rule { when: |bmi| *bmi < 30.0, then: 1 },
    Rule { when: |_| true, then: 2 },
];

pub const SEX_RULES: &[Rule<str, Sex>] = &[
    Rule {
        when: |text| {
            let text = text.to_lowercase();
            text.contains("femenino") || text.contains("female")
        },
        then: Sex::Female,
    },
    Rule { when: |_| true, then: Sex::Male },
];

// "no" is checked before the digits: "no, 1 vez" is still inactive.
pub const ACTIVITY_RULES: &[Rule<str, ActivityLevel>] = &[
    Rule {
        when: |text| text.to_lowercase().contains("no"),
        then: ActivityLevel::Inactive,
    },
    Rule {
        when: |text| text.contains('1') || text.contains('2'),
        then: ActivityLevel::Low,
    },
    Rule { when: |_| true, then: ActivityLevel::High },
];

pub fn normalize_sex(text: &str) -> Sex {
    first_match(SEX_RULES, text).unwrap_or(Sex::Male)
}

pub fn normalize_activity(text: &str) -> ActivityLevel {
    first_match(ACTIVITY_RULES, text).unwrap_or(ActivityLevel::High)
}

/// Body mass index in kg/m². A zero height yields 0 instead of dividing.
pub fn body_mass_index(weight_kg: f64, height_cm: i32) -> f64 {
    if height_cm == 0 {
        return 0.0;
    }
    let meters = f64::from(height_cm) / 100.0;
    weight_kg / meters.powi(2)
}

pub fn encode(observation: &ClinicalObservation) -> Result<FeatureVector, DiagnosisError> {
    let bmi = body_mass_index(observation.weight, observation.height);
    if !bmi.is_finite() {
        return Err(DiagnosisError::Encoding(format!(
            "body mass index is not finite for weight {} and height {}",
            observation.weight, observation.height
        )));
    }

    Ok(FeatureVector([
        bucket("age", AGE_RULES, &observation.age)?,
        sex_bucket(observation.sex),
        bucket("systolic", SYSTOLIC_RULES, &observation.systolic)?,
        bucket("diastolic", DIASTOLIC_RULES, &observation.diastolic)?,
        bucket("cholesterol", CHOLESTEROL_RULES, &observation.cholesterol)?,
        bucket("glucose", GLUCOSE_RULES, &observation.glucose)?,
        u8::from(observation.smoker),
        u8::from(observation.alcohol),
        activity_bucket(observation.activity),
        bucket("bmi", BMI_RULES, &bmi)?,
    ]))
}

fn bucket<T: Debug>(feature: &str, rules: &[Rule<T, u8>], value: &T) -> Result<u8, DiagnosisError> {
    first_match(rules, value)
        .ok_or_else(|| DiagnosisError::Encoding(format!("no {feature} bucket matches {value:?}")))
}

fn sex_bucket(sex: Sex) -> u8 {
    match sex {
        Sex::Female => 0,
        Sex::Male => 1,
    }
}

fn activity_bucket(activity: ActivityLevel) -> u8 {
    match activity {
        ActivityLevel::Inactive => 2,
        ActivityLevel::Low => 1,
        ActivityLevel::High => 0,
    }
}
