//! Percentiles, five-number summaries and histogram binning

use serde::Serialize;

use super::{distinct_keys, field_key, field_number, group_numbers, numeric_column, sorted};
use crate::spec::Row;

/// Linear-interpolation percentile over ascending `sorted` values
///
/// `idx = (n - 1) * p`, interpolating between the floor and ceil indices. This one
/// routine backs both boxplot summaries and IQR error bars.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = idx - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub count: usize,
}

impl FiveNumberSummary {
    pub fn as_array(&self) -> [f64; 5] {
        [self.min, self.q1, self.median, self.q3, self.max]
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Five-number summary of unsorted values
pub fn five_number_summary(values: &[f64]) -> Option<FiveNumberSummary> {
    let s = sorted(values);
    Some(FiveNumberSummary {
        min: *s.first()?,
        q1: percentile(&s, 0.25)?,
        median: percentile(&s, 0.5)?,
        q3: percentile(&s, 0.75)?,
        max: *s.last()?,
        count: s.len(),
    })
}

/// Boxplot basis for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub category: String,
    pub summary: FiveNumberSummary,
}

/// Per-category five-number summaries, categories in first-seen order
pub fn box_stats(rows: &[Row], category_field: &str, value_field: &str) -> Vec<BoxStats> {
    group_numbers(rows, category_field, value_field)
        .into_iter()
        .filter_map(|(category, values)| {
            five_number_summary(&values).map(|summary| BoxStats { category, summary })
        })
        .collect()
}

/// Sturges' rule with a floor of five bins
pub fn histogram_bin_count(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let sturges = ((n as f64).log2() + 1.0).ceil() as usize;
    sturges.max(5)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub x0: f64,
    pub x1: f64,
    pub count: usize,
}

impl HistogramBin {
    pub fn midpoint(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub width: f64,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    fn empty_like(&self) -> Self {
        Self {
            min: self.min,
            width: self.width,
            bins: self
                .bins
                .iter()
                .map(|b| HistogramBin { count: 0, ..*b })
                .collect(),
        }
    }

    /// Bin index for `v`: right-open intervals, last bin closed at the maximum
    fn bin_index(&self, v: f64) -> Option<usize> {
        let last = self.bins.len().checked_sub(1)?;
        let upper = self.bins[last].x1;
        if v < self.min || v > upper {
            return None;
        }
        let idx = offset(v, self.min, self.width).floor() as usize;
        Some(idx.min(last))
    }

    fn add(&mut self, v: f64) {
        if let Some(i) = self.bin_index(v) {
            self.bins[i].count += 1;
        }
    }

    pub fn counts(&self) -> Vec<usize> {
        self.bins.iter().map(|b| b.count).collect()
    }
}

/// `(v - min) / width` without overflowing when the span exceeds `f64::MAX`
fn offset(v: f64, min: f64, width: f64) -> f64 {
    let span = v - min;
    if span.is_finite() {
        span / width
    } else {
        v / width - min / width
    }
}

fn bin_edges(values: &[f64]) -> Option<Histogram> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    let count = histogram_bin_count(values.len());
    let n = count as f64;
    let width = match max - min {
        span if span > 0.0 && span.is_finite() => span / n,
        span if span > 0.0 => max / n - min / n,
        _ => 1.0,
    };
    let bins = (0..count)
        .map(|i| HistogramBin {
            x0: min + width * i as f64,
            x1: if i + 1 == count && max > min { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    Some(Histogram { min, width, bins })
}

/// Uniform-width histogram of `values`
pub fn histogram(values: &[f64]) -> Option<Histogram> {
    let mut hist = bin_edges(values)?;
    for &v in values {
        hist.add(v);
    }
    Some(hist)
}

/// One group's counts over shared bin edges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSeries {
    pub group: Option<String>,
    pub histogram: Histogram,
}

/// Histograms of `value_field`, split by `group_field` over bin edges computed from
/// all values so the groups line up
pub fn histogram_series(rows: &[Row], value_field: &str, group_field: Option<&str>) -> Vec<HistogramSeries> {
    let all = numeric_column(rows, value_field);
    let Some(edges) = bin_edges(&all) else {
        return Vec::new();
    };

    match group_field {
        None => {
            let mut hist = edges;
            for v in all {
                hist.add(v);
            }
            vec![HistogramSeries {
                group: None,
                histogram: hist,
            }]
        }
        Some(group_field) => distinct_keys(rows, group_field)
            .into_iter()
            .map(|group| {
                let mut hist = edges.empty_like();
                rows.iter()
                    .filter(|r| field_key(r, group_field) == group)
                    .filter_map(|r| field_number(r, value_field))
                    .for_each(|v| hist.add(v));
                HistogramSeries {
                    group: Some(group),
                    histogram: hist,
                }
            })
            .collect(),
    }
}
