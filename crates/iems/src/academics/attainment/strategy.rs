use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::settings::ComponentWeights;
use crate::academics::domain::{AssessmentComponent, ExamType};

/// How a student's per-assessment percentages combine into one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "avg", alias = "average")]
    Average,
    #[serde(rename = "weighted")]
    Weighted,
}

impl AggregationMethod {
    pub const fn label(self) -> &'static str {
        match self {
            AggregationMethod::Best => "best",
            AggregationMethod::Average => "avg",
            AggregationMethod::Weighted => "weighted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "best" | "max" => Some(Self::Best),
            "avg" | "average" | "mean" => Some(Self::Average),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }
}

/// A student's percentage on one contributing assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScore {
    pub exam_type: ExamType,
    pub percentage: f64,
}

/// Combines the assessments a student actually sat.
///
/// Assessments without marks never reach this function, so an empty slice
/// means "not assessed" and yields `None` rather than zero.
pub fn aggregate(
    method: AggregationMethod,
    scores: &[AssessmentScore],
    weights: &ComponentWeights,
    overrides: &BTreeMap<ExamType, f64>,
) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }

    match method {
        AggregationMethod::Best => scores
            .iter()
            .map(|score| score.percentage)
            .reduce(f64::max),
        AggregationMethod::Average => mean(scores.iter().map(|score| score.percentage)),
        AggregationMethod::Weighted if overrides.is_empty() => weighted_split(scores, weights),
        AggregationMethod::Weighted => weighted_by_exam_type(scores, overrides)
            .or_else(|| mean(scores.iter().map(|score| score.percentage))),
    }
}

fn weighted_split(scores: &[AssessmentScore], weights: &ComponentWeights) -> Option<f64> {
    let component_mean = |component: AssessmentComponent| {
        mean(
            scores
                .iter()
                .filter(|score| score.exam_type.component() == component)
                .map(|score| score.percentage),
        )
    };

    match (
        component_mean(AssessmentComponent::Internal),
        component_mean(AssessmentComponent::External),
    ) {
        (Some(internal), Some(external)) => {
            let total = weights.internal + weights.external;
            if total <= 0.0 {
                return mean([internal, external]);
            }
            Some((weights.internal * internal + weights.external * external) / total)
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

/// Normalized mean over the exam types present. Types without a positive
/// override weight do not contribute.
fn weighted_by_exam_type(
    scores: &[AssessmentScore],
    overrides: &BTreeMap<ExamType, f64>,
) -> Option<f64> {
    let mut per_type: BTreeMap<ExamType, Vec<f64>> = BTreeMap::new();
    for score in scores {
        per_type
            .entry(score.exam_type)
            .or_default()
            .push(score.percentage);
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (exam_type, percentages) in &per_type {
        let weight = overrides.get(exam_type).copied().unwrap_or(0.0);
        if weight <= 0.0 {
            continue;
        }
        if let Some(type_mean) = mean(percentages.iter().copied()) {
            weighted_sum += weight * type_mean;
            weight_total += weight;
        }
    }

    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        None
    }
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
