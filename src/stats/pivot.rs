//! Category x group pivoting and 2-D cell aggregation

use std::collections::HashMap;

use serde::Serialize;

use super::{field_key, field_number};
use crate::spec::{Reducer, Row};

/// Ordered category and group axes with one value per (group, category) cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pivot {
    pub categories: Vec<String>,
    pub groups: Vec<String>,
    /// `values[group][category]`; `None` where no numeric row landed
    pub values: Vec<Vec<Option<f64>>>,
}

impl Pivot {
    pub fn value(&self, category: &str, group: &str) -> Option<f64> {
        let c = self.categories.iter().position(|x| x == category)?;
        let g = self.groups.iter().position(|x| x == group)?;
        self.values[g][c]
    }

    /// Reorder the category axis; unknown names are ignored, unlisted ones dropped
    pub fn reorder_categories(&mut self, order: &[String]) {
        let positions: Vec<usize> = order
            .iter()
            .filter_map(|name| self.categories.iter().position(|c| c == name))
            .collect();
        self.categories = positions.iter().map(|&i| self.categories[i].clone()).collect();
        for series in &mut self.values {
            *series = positions.iter().map(|&i| series[i]).collect();
        }
    }
}

#[derive(Default, Clone, Copy)]
struct Cell {
    sum: f64,
    count: usize,
}

/// Label of the single group when no group field is given
pub const SINGLE_GROUP: &str = "";

fn intern(key: String, index: &mut HashMap<String, usize>, order: &mut Vec<String>) -> usize {
    if let Some(&i) = index.get(&key) {
        return i;
    }
    order.push(key.clone());
    index.insert(key, order.len() - 1);
    order.len() - 1
}

/// Pivot rows into a category x group grid in one linear pass
///
/// A cell fed by more than one row holds the mean of those rows, so duplicate
/// observations are never silently summed.
pub fn pivot(rows: &[Row], category_field: &str, group_field: Option<&str>, value_field: &str) -> Pivot {
    let mut categories = Vec::new();
    let mut groups = Vec::new();
    let mut category_index = HashMap::new();
    let mut group_index = HashMap::new();
    let mut cells: HashMap<(usize, usize), Cell> = HashMap::new();

    for row in rows {
        let c = intern(field_key(row, category_field), &mut category_index, &mut categories);
        let g = match group_field {
            Some(field) => intern(field_key(row, field), &mut group_index, &mut groups),
            None => intern(SINGLE_GROUP.to_string(), &mut group_index, &mut groups),
        };
        if let Some(v) = field_number(row, value_field) {
            let cell = cells.entry((g, c)).or_default();
            cell.sum += v;
            cell.count += 1;
        }
    }

    let values = (0..groups.len())
        .map(|g| {
            (0..categories.len())
                .map(|c| {
                    cells.get(&(g, c)).map(|cell| {
                        if cell.count > 1 {
                            cell.sum / cell.count as f64
                        } else {
                            cell.sum
                        }
                    })
                })
                .collect()
        })
        .collect();

    Pivot {
        categories,
        groups,
        values,
    }
}

/// Reducer for heatmap cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapReducer {
    Count,
    Sum,
    Mean,
}

impl HeatmapReducer {
    /// Reducer implied by an aggregate block and the presence of a value field
    pub fn resolve(aggregate: Option<Reducer>, has_value_field: bool) -> Self {
        match aggregate {
            Some(Reducer::Count) => HeatmapReducer::Count,
            Some(Reducer::Sum) if has_value_field => HeatmapReducer::Sum,
            Some(Reducer::Mean) if has_value_field => HeatmapReducer::Mean,
            _ if has_value_field => HeatmapReducer::Mean,
            _ => HeatmapReducer::Count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatCell {
    pub x_index: usize,
    pub y_index: usize,
    pub value: f64,
}

/// Sparse heatmap grid plus the observed value range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapGrid {
    pub x_categories: Vec<String>,
    pub y_categories: Vec<String>,
    pub cells: Vec<HeatCell>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl HeatmapGrid {
    pub fn value(&self, x: &str, y: &str) -> Option<f64> {
        let xi = self.x_categories.iter().position(|c| c == x)?;
        let yi = self.y_categories.iter().position(|c| c == y)?;
        self.cells
            .iter()
            .find(|c| c.x_index == xi && c.y_index == yi)
            .map(|c| c.value)
    }
}

/// Group rows by (x, y) category pair and reduce each cell
pub fn heatmap_cells(
    rows: &[Row],
    x_field: &str,
    y_field: &str,
    value_field: Option<&str>,
    reducer: HeatmapReducer,
) -> HeatmapGrid {
    let mut x_categories = Vec::new();
    let mut y_categories = Vec::new();
    let mut x_index = HashMap::new();
    let mut y_index = HashMap::new();
    let mut order: Vec<(usize, usize)> = Vec::new();
    let mut cells: HashMap<(usize, usize), (Cell, usize)> = HashMap::new();

    for row in rows {
        let xi = intern(field_key(row, x_field), &mut x_index, &mut x_categories);
        let yi = intern(field_key(row, y_field), &mut y_index, &mut y_categories);
        let (cell, row_count) = cells.entry((xi, yi)).or_insert_with(|| {
            order.push((xi, yi));
            (Cell::default(), 0)
        });
        *row_count += 1;
        if let Some(v) = value_field.and_then(|f| field_number(row, f)) {
            cell.sum += v;
            cell.count += 1;
        }
    }

    let cells: Vec<HeatCell> = order
        .into_iter()
        .filter_map(|key| {
            let (cell, row_count) = cells.get(&key)?;
            let value = match reducer {
                HeatmapReducer::Count => *row_count as f64,
                HeatmapReducer::Sum => cell.sum,
                HeatmapReducer::Mean if cell.count > 0 => cell.sum / cell.count as f64,
                HeatmapReducer::Mean => return None,
            };
            Some(HeatCell {
                x_index: key.0,
                y_index: key.1,
                value,
            })
        })
        .collect();

    let min = cells.iter().map(|c| c.value).reduce(f64::min);
    let max = cells.iter().map(|c| c.value).reduce(f64::max);

    HeatmapGrid {
        x_categories,
        y_categories,
        cells,
        min,
        max,
    }
}
