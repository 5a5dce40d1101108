use std::collections::HashMap;
use std::str::FromStr;

use crate::encode::{normalize_activity, normalize_sex};
use crate::error::ValidationError;
use crate::models::ClinicalObservation;

/// Form keys, in the order they are checked.
pub const FIELDS: [&str; 11] = [
    "edad",
    "genero",
    "ps",
    "pd",
    "colesterol",
    "glucosa",
    "fuma",
    "alcohol",
    "actividad",
    "peso",
    "estatura",
];

/// Parses a submitted form into an observation. Values are not range checked;
/// the encoder's open-ended buckets absorb outliers.
pub fn validate_submission(
    form: &HashMap<String, String>,
) -> Result<ClinicalObservation, ValidationError> {
    let age = parse_number::<i32>(form, "edad")?;
    let sex_text = required(form, "genero")?;
    let systolic = parse_number::<i32>(form, "ps")?;
    let diastolic = parse_number::<i32>(form, "pd")?;
    let cholesterol = parse_measure(form, "colesterol")?;
    let glucose = parse_measure(form, "glucosa")?;
    let smoker = is_yes(required(form, "fuma")?);
    let alcohol = is_yes(required(form, "alcohol")?);
    let activity_text = required(form, "actividad")?;
    let weight = parse_measure(form, "peso")?;
    let height = parse_number::<i32>(form, "estatura")?;

    Ok(ClinicalObservation {
        age,
        sex: normalize_sex(sex_text),
        sex_text: sex_text.to_string(),
        systolic,
        diastolic,
        cholesterol,
        glucose,
        smoker,
        alcohol,
        activity: normalize_activity(activity_text),
        activity_text: activity_text.to_string(),
        weight,
        height,
    })
}

fn required<'a>(
    form: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    form.get(field)
        .map(String::as_str)
        .ok_or_else(|| ValidationError::missing(field))
}

fn parse_number<T: FromStr>(
    form: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, ValidationError> {
    required(form, field)?
        .trim()
        .parse::<T>()
        .map_err(|_| ValidationError::not_numeric(field))
}

fn parse_measure(form: &HashMap<String, String>, field: &'static str) -> Result<f64, ValidationError> {
    let value = parse_number::<f64>(form, field)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::not_numeric(field))
    }
}

/// Only an exact `s` counts as yes; the model was trained on that encoding.
pub fn is_yes(text: &str) -> bool {
    text == "s"
}
