//! Specialized curves: Kaplan-Meier survival and ROC

use serde::Serialize;
use serde_json::Value;

use super::{distinct_keys, field_key, field_number, to_number};
use crate::spec::Row;

/// Binary reading of an event/label cell: booleans, 0/1 numbers, "true"/"false"
pub fn to_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => to_number(value).map(|n| n != 0.0),
        },
        _ => to_number(value).map(|n| n != 0.0),
    }
}

fn partition<'a>(rows: &'a [Row], group_field: Option<&str>) -> Vec<(Option<String>, Vec<&'a Row>)> {
    match group_field {
        None => vec![(None, rows.iter().collect())],
        Some(field) => distinct_keys(rows, field)
            .into_iter()
            .map(|key| {
                let members = rows.iter().filter(|r| field_key(r, field) == key).collect();
                (Some(key), members)
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmPoint {
    pub time: f64,
    pub survival: f64,
    pub at_risk: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KmCurve {
    pub group: Option<String>,
    pub points: Vec<KmPoint>,
}

fn km_points(mut observations: Vec<(f64, bool)>) -> Vec<KmPoint> {
    observations.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut at_risk = observations.len();
    let mut survival = 1.0;
    let mut points = vec![KmPoint {
        time: 0.0,
        survival,
        at_risk,
    }];

    let mut i = 0;
    while i < observations.len() {
        let time = observations[i].0;
        let mut events = 0;
        let mut leaving = 0;
        while i < observations.len() && observations[i].0 == time {
            if observations[i].1 {
                events += 1;
            }
            leaving += 1;
            i += 1;
        }
        if events > 0 {
            survival *= 1.0 - events as f64 / at_risk as f64;
        }
        points.push(KmPoint {
            time,
            survival,
            at_risk,
        });
        at_risk -= leaving;
    }
    points
}

/// Product-limit survival estimate per group
pub fn kaplan_meier(rows: &[Row], time_field: &str, event_field: &str, group_field: Option<&str>) -> Vec<KmCurve> {
    partition(rows, group_field)
        .into_iter()
        .map(|(group, members)| {
            let observations = members
                .iter()
                .filter_map(|r| Some((field_number(r, time_field)?, to_flag(r.get(event_field)?)?)))
                .collect::<Vec<_>>();
            KmCurve {
                group,
                points: km_points(observations),
            }
        })
        .filter(|c| c.points.len() > 1)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Score threshold; `None` for the (0, 0) origin
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub group: Option<String>,
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

fn roc_points(mut scored: Vec<(f64, bool)>) -> Option<(Vec<RocPoint>, f64)> {
    let positives = scored.iter().filter(|(_, label)| *label).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: None,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < scored.len() {
        let threshold = scored[i].0;
        while i < scored.len() && scored[i].0 == threshold {
            if scored[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            fpr: fp as f64 / negatives as f64,
            tpr: tp as f64 / positives as f64,
            threshold: Some(threshold),
        });
    }

    let auc = points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[0].tpr + w[1].tpr) / 2.0)
        .sum();
    Some((points, auc))
}

/// ROC curve and AUC per group; groups lacking either class are skipped
pub fn roc_curve(rows: &[Row], score_field: &str, label_field: &str, group_field: Option<&str>) -> Vec<RocCurve> {
    partition(rows, group_field)
        .into_iter()
        .filter_map(|(group, members)| {
            let scored = members
                .iter()
                .filter_map(|r| Some((field_number(r, score_field)?, to_flag(r.get(label_field)?)?)))
                .collect::<Vec<_>>();
            let (points, auc) = roc_points(scored)?;
            Some(RocCurve { group, points, auc })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::fixtures::rows;
    use serde_json::json;

    #[test]
    fn test_flags() {
        assert_eq!(to_flag(&json!(true)), Some(true));
        assert_eq!(to_flag(&json!(0)), Some(false));
        assert_eq!(to_flag(&json!("1")), Some(true));
        assert_eq!(to_flag(&json!("No")), Some(false));
        assert_eq!(to_flag(&json!("maybe")), None);
    }

    #[test]
    fn test_kaplan_meier_with_censoring() {
        // times 1(event) 2(censored) 3(event) 3(event) 4(censored)
        let input = rows(json!([
            { "t": 1, "e": 1 }, { "t": 2, "e": 0 }, { "t": 3, "e": 1 }, { "t": 3, "e": 1 }, { "t": 4, "e": 0 }
        ]));
        let curves = kaplan_meier(&input, "t", "e", None);
        assert_eq!(curves.len(), 1);
        let s: Vec<f64> = curves[0].points.iter().map(|p| p.survival).collect();
        // 1 -> 4/5 ; 2 -> unchanged ; 3 -> 0.8 * (1 - 2/3)
        assert_eq!(s[0], 1.0);
        assert!((s[1] - 0.8).abs() < 1e-12);
        assert!((s[2] - 0.8).abs() < 1e-12);
        assert!((s[3] - 0.8 / 3.0).abs() < 1e-12);
        assert_eq!(curves[0].points[3].at_risk, 3);
    }

    #[test]
    fn test_roc_perfect_and_random() {
        let perfect = rows(json!([
            { "s": 0.9, "y": 1 }, { "s": 0.8, "y": 1 }, { "s": 0.2, "y": 0 }, { "s": 0.1, "y": 0 }
        ]));
        let curves = roc_curve(&perfect, "s", "y", None);
        assert_eq!(curves[0].auc, 1.0);
        let last = curves[0].points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));

        let tied = rows(json!([
            { "s": 0.5, "y": 1 }, { "s": 0.5, "y": 0 }
        ]));
        assert_eq!(roc_curve(&tied, "s", "y", None)[0].auc, 0.5);
    }

    #[test]
    fn test_roc_skips_single_class_groups() {
        let input = rows(json!([
            { "s": 0.9, "y": 1, "g": "a" }, { "s": 0.1, "y": 0, "g": "a" }, { "s": 0.4, "y": 1, "g": "b" }
        ]));
        let curves = roc_curve(&input, "s", "y", Some("g"));
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].group.as_deref(), Some("a"));
    }
}
