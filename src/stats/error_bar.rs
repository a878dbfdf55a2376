//! Error-bar statistics

use serde::Serialize;

use super::{group_numbers, percentile, sorted};
use crate::spec::{ErrorBarType, Row};

/// Critical values for the supported confidence levels; anything else uses 95%.
const Z_TABLE: [(f64, f64); 3] = [(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)];
const DEFAULT_Z: f64 = 1.96;

/// z critical value for a confidence level given as a fraction or a percentage
pub fn z_for_level(level: Option<f64>) -> f64 {
    let Some(level) = level else {
        return DEFAULT_Z;
    };
    let level = if level > 1.0 { level / 100.0 } else { level };
    Z_TABLE
        .iter()
        .find(|(l, _)| (l - level).abs() < 1e-9)
        .map(|(_, z)| *z)
        .unwrap_or(DEFAULT_Z)
}

/// Mean and spread of one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBarPoint {
    pub category: String,
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (Bessel-corrected, 0 when n = 1)
    pub std: f64,
    /// Distance from the mean down to the lower end
    pub minus: f64,
    /// Distance from the mean up to the upper end
    pub plus: f64,
}

impl ErrorBarPoint {
    pub fn lower(&self) -> f64 {
        self.mean - self.minus
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.plus
    }
}

/// Mean, sample variance and standard deviation
fn moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, variance, variance.sqrt())
}

/// Statistics for one category's values
pub fn error_bar_point(category: String, values: &[f64], bar_type: ErrorBarType, level: Option<f64>) -> Option<ErrorBarPoint> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let (mean, _variance, std) = moments(values);
    let (minus, plus) = match bar_type {
        ErrorBarType::Stdev => (std, std),
        ErrorBarType::Stderr => {
            let se = std / (n as f64).sqrt();
            (se, se)
        }
        ErrorBarType::Ci => {
            let half = z_for_level(level) * std / (n as f64).sqrt();
            (half, half)
        }
        ErrorBarType::Iqr => {
            let s = sorted(values);
            let q1 = percentile(&s, 0.25)?;
            let q3 = percentile(&s, 0.75)?;
            (mean - q1, q3 - mean)
        }
    };
    Some(ErrorBarPoint {
        category,
        n,
        mean,
        std,
        minus,
        plus,
    })
}

/// Per-category error-bar statistics, categories in first-seen order
pub fn error_bar_stats(
    rows: &[Row],
    category_field: &str,
    value_field: &str,
    bar_type: ErrorBarType,
    level: Option<f64>,
) -> Vec<ErrorBarPoint> {
    group_numbers(rows, category_field, value_field)
        .into_iter()
        .filter_map(|(category, values)| error_bar_point(category, &values, bar_type, level))
        .collect()
}
