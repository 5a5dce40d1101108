use crate::models::{ClassProbabilities, RiskAssessment, RiskClass};

/// Picks the most probable class; on exact ties the lowest index wins.
pub fn interpret(probabilities: &ClassProbabilities) -> RiskAssessment {
    let (index, max) = probabilities
        .0
        .iter()
        .enumerate()
        .fold((0, probabilities.0[0]), |best, (index, &p)| {
            if p > best.1 {
                (index, p)
            } else {
                best
            }
        });
    let risk_class = RiskClass::from_index(index).unwrap_or(RiskClass::Low);

    RiskAssessment {
        risk_class,
        confidence: to_percentage(max),
        label: risk_class.label().to_string(),
    }
}

/// Exact halves round to even, so 0.65625 reports 65.62 rather than 65.63.
fn to_percentage(probability: f32) -> f64 {
    (f64::from(probability) * 100.0 * 100.0).round_ties_even() / 100.0
}
