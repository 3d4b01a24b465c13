//! Selection of World Development Indicators by topic, restricted to the case series countries.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::{debug, info};
use polars::prelude::*;

use crate::config::Config;
use crate::error::{ReconError, Result};
use crate::reconcile::{reconcile, CountryAliases};
use crate::COL;

/// One positional removal from the matched topic list. Removals are applied one after the
/// other, so each position refers to the list left by the previous removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Remove the element at this position from the start
    At(usize),
    /// Remove the n-th element from the end, `FromEnd(1)` being the last one
    FromEnd(usize),
}

/// A hand-curated exclusion list written against a specific snapshot of the matched topics. It
/// refuses to run when the number of matched topics differs from that snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicExclusion {
    pub expected_topic_count: usize,
    pub removals: Vec<Removal>,
}

impl TopicExclusion {
    /// The curation of the `Health` topics: drop the 6th topic, then the last two, then the first.
    pub fn health(expected_topic_count: usize) -> Self {
        Self {
            expected_topic_count,
            removals: vec![
                Removal::At(5),
                Removal::FromEnd(1),
                Removal::FromEnd(1),
                Removal::At(0),
            ],
        }
    }

    pub fn apply(&self, topics: &[String]) -> Result<Vec<String>> {
        let mismatch = || ReconError::TopicCountMismatch {
            expected: self.expected_topic_count,
            found: topics.len(),
        };
        if topics.len() != self.expected_topic_count {
            return Err(mismatch());
        }
        let mut kept = topics.to_vec();
        for removal in &self.removals {
            let position = match *removal {
                Removal::At(position) => Some(position),
                Removal::FromEnd(n) => kept.len().checked_sub(n),
            }
            .filter(|position| *position < kept.len())
            .ok_or_else(mismatch)?;
            kept.remove(position);
        }
        Ok(kept)
    }
}

/// Distinct topics containing `keyword` (case-sensitive), in order of first appearance.
pub fn matching_topics(catalog: &DataFrame, keyword: &str) -> Result<Vec<String>> {
    Ok(catalog
        .column(COL::TOPIC)?
        .str()?
        .into_iter()
        .flatten()
        .filter(|topic| topic.contains(keyword))
        .unique()
        .map(str::to_string)
        .collect())
}

/// Distinct indicator names filed under any of `topics`.
pub fn indicators_for_topics(catalog: &DataFrame, topics: &[String]) -> Result<Vec<String>> {
    let topic_column = catalog.column(COL::TOPIC)?.str()?;
    let indicator_column = catalog.column(COL::INDICATOR_NAME)?.str()?;
    Ok(topic_column
        .into_iter()
        .zip(indicator_column)
        .filter_map(|(topic, indicator)| match (topic, indicator) {
            (Some(topic), Some(indicator)) if topics.iter().any(|t| t == topic) => Some(indicator),
            _ => None,
        })
        .unique()
        .map(str::to_string)
        .collect())
}

fn row_mask(
    data: &DataFrame,
    indicators: &BTreeSet<&str>,
    countries: Option<&BTreeSet<String>>,
) -> Result<Vec<bool>> {
    let country_column = data.column(COL::WDI_COUNTRY_NAME)?.str()?;
    let indicator_column = data.column(COL::INDICATOR_NAME)?.str()?;
    Ok(country_column
        .into_iter()
        .zip(indicator_column)
        .map(|(country, indicator)| match (country, indicator) {
            (Some(country), Some(indicator)) => {
                indicators.contains(indicator)
                    && countries.map_or(true, |countries| countries.contains(country))
            }
            _ => false,
        })
        .collect())
}

/// Countries reporting any of `indicators` that are also in `reference_countries`.
pub fn common_countries(
    data: &DataFrame,
    indicators: &[String],
    reference_countries: &BTreeSet<String>,
) -> Result<BTreeSet<String>> {
    let indicators: BTreeSet<&str> = indicators.iter().map(String::as_str).collect();
    let mask = row_mask(data, &indicators, None)?;
    let country_column = data.column(COL::WDI_COUNTRY_NAME)?.str()?;
    Ok(country_column
        .into_iter()
        .zip(mask)
        .filter_map(|(country, keep)| if keep { country } else { None })
        .filter(|country| reference_countries.contains(*country))
        .map(str::to_string)
        .collect())
}

/// Long table of `(Country Name, Indicator Name, <year>)` for the selected rows. The value for
/// `year` is the last non-null numeric value among the year columns up to and including `year`.
pub fn indicator_values(
    data: &DataFrame,
    indicators: &[String],
    countries: &BTreeSet<String>,
    year: &str,
) -> Result<DataFrame> {
    let target: i32 = year
        .parse()
        .map_err(|_| ReconError::MissingColumn(year.to_string()))?;
    if !data.get_column_names().contains(&year) {
        return Err(ReconError::MissingColumn(year.to_string()));
    }
    let indicators: BTreeSet<&str> = indicators.iter().map(String::as_str).collect();
    let mask = row_mask(data, &indicators, Some(countries))?;
    let selected = data.filter(&BooleanChunked::new("keep", mask))?;

    let year_columns = selected
        .get_column_names()
        .into_iter()
        .filter(|name| name.parse::<i32>().is_ok_and(|y| y <= target))
        .map(|name| {
            let values = selected.column(name)?.cast(&DataType::Float64)?;
            Ok(values.f64()?.clone())
        })
        .collect::<Result<Vec<Float64Chunked>>>()?;
    debug!("Forward filling across {} year columns", year_columns.len());
    let values: Vec<Option<f64>> = (0..selected.height())
        .map(|row| {
            year_columns
                .iter()
                .filter_map(|column| column.get(row))
                .last()
        })
        .collect();

    Ok(DataFrame::new(vec![
        selected.column(COL::WDI_COUNTRY_NAME)?.clone(),
        selected.column(COL::INDICATOR_NAME)?.clone(),
        Series::new(year, values),
    ])?)
}

/// The outcome of the indicator selection.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorSelection {
    /// Topics left after the curated exclusion
    pub topics: Vec<String>,
    pub indicators: Vec<String>,
    /// Countries in both the indicator data and the case series
    pub countries: BTreeSet<String>,
    pub table: DataFrame,
}

/// Select the indicators of the `topic_keyword` topics from `catalog` (`Topic`, `Indicator Name`)
/// and their values from `data` (`Country Name`, `Indicator Name`, year columns...).
pub fn select_indicators(
    catalog: &DataFrame,
    data: &DataFrame,
    reference_countries: &BTreeSet<String>,
    config: &Config,
) -> Result<IndicatorSelection> {
    let matched = matching_topics(catalog, &config.topic_keyword)?;
    let topics = TopicExclusion::health(config.expected_topic_count).apply(&matched)?;
    info!("Using indicators covering the topics: {}", topics.iter().join(", "));
    let indicators = indicators_for_topics(catalog, &topics)?;

    let data = reconcile(data, COL::WDI_COUNTRY_NAME, &CountryAliases::world_bank())?;
    let countries = common_countries(&data, &indicators, reference_countries)?;
    info!(
        "There are {} countries in the intersection of the indicator data and the case series.",
        countries.len()
    );
    let table = indicator_values(&data, &indicators, &countries, &config.indicator_year)?;
    Ok(IndicatorSelection {
        topics,
        indicators,
        countries,
        table,
    })
}
