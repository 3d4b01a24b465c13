//! Helpers shared by the date-indexed tables: a `date` column of polars `Date` dtype followed by
//! one `Float64` column per country.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::warn;
use polars::prelude::*;

use crate::error::{ReconError, Result};
use crate::COL;

/// What to do when a wide sheet has more than one row for the same country label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateLabels {
    /// Add the rows together per date, skipping nulls
    Sum,
    /// Keep the first row and ignore the rest
    First,
}

fn merge_sum(existing: &mut [Option<f64>], incoming: &[Option<f64>]) {
    for (acc, value) in existing.iter_mut().zip(incoming) {
        *acc = match (*acc, *value) {
            (Some(a), Some(b)) => Some(a + b),
            (a, None) => a,
            (None, b) => b,
        };
    }
}

/// Turn a wide table with one row per country label and one column per date into a table with
/// one row per date and one column per country. `value_columns[i]` holds the values for
/// `dates[i]`. Countries keep the order of their first appearance; rows with a null label are
/// ignored.
pub fn transpose_by_label(
    df: &DataFrame,
    label_column: &str,
    value_columns: &[String],
    dates: &[NaiveDate],
    duplicates: DuplicateLabels,
) -> Result<DataFrame> {
    debug_assert_eq!(value_columns.len(), dates.len());
    let labels = df.column(label_column)?.str()?.clone();
    let columns = value_columns
        .iter()
        .map(|name| {
            let values = df
                .column(name)
                .map_err(|_| ReconError::MissingColumn(name.clone()))?
                .cast(&DataType::Float64)?;
            Ok(values.f64()?.clone())
        })
        .collect::<Result<Vec<Float64Chunked>>>()?;

    let mut order: Vec<String> = vec![];
    let mut by_label: HashMap<String, Vec<Option<f64>>> = HashMap::new();
    for (row, label) in labels.into_iter().enumerate() {
        let Some(label) = label else { continue };
        let row_values: Vec<Option<f64>> = columns.iter().map(|ca| ca.get(row)).collect();
        match by_label.get_mut(label) {
            Some(existing) => match duplicates {
                DuplicateLabels::Sum => merge_sum(existing, &row_values),
                DuplicateLabels::First => warn!("Ignoring duplicate row for '{label}'"),
            },
            None => {
                order.push(label.to_owned());
                by_label.insert(label.to_owned(), row_values);
            }
        }
    }

    let mut series = Vec::with_capacity(order.len() + 1);
    series.push(Series::new(COL::DATE, dates));
    for label in order {
        // Unwrap: every label in `order` was inserted into `by_label`
        let values = by_label.remove(&label).unwrap();
        series.push(Series::new(&label, values));
    }
    Ok(DataFrame::new(series)?)
}

/// The dates of a date-indexed table, in row order.
pub fn dates(df: &DataFrame) -> Result<Vec<NaiveDate>> {
    let column = df
        .column(COL::DATE)
        .map_err(|_| ReconError::MissingColumn(COL::DATE.into()))?;
    column
        .date()?
        .as_date_iter()
        .map(|date| date.ok_or_else(|| ReconError::DateParse("null date in table index".into())))
        .collect()
}

/// The country columns of a date-indexed table, in column order.
pub fn countries(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| *name != COL::DATE && *name != COL::DAY)
        .map(|name| name.to_owned())
        .collect()
}

/// The values of one country column as `f64`s, nulls kept.
pub fn country_values(df: &DataFrame, country: &str) -> Result<Vec<Option<f64>>> {
    if !df.get_column_names().contains(&country) {
        return Err(ReconError::CountryNotFound(country.to_string()));
    }
    let values = df.column(country)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

/// An empty date-indexed table holding only the given dates.
pub fn dates_only(dates: &[NaiveDate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![Series::new(COL::DATE, dates)])?)
}
