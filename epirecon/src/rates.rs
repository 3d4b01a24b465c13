//! Incidence and contagion rates per 100,000 inhabitants.
//!
//! All case series and the population table are explicit inputs: nothing here reads shared
//! state.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::Add;

use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;

use crate::cases::{CaseSeries, CaseSeriesSet, Metric};
use crate::error::{ReconError, Result};
use crate::COL;

const PER_100K: f64 = 1e5;

/// Country to 2020 population estimate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopulationTable(BTreeMap<String, f64>);

impl PopulationTable {
    /// Build from a table with `Country` and `Population (2020)` columns. Rows with a missing
    /// name or population are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let countries = df
            .column(COL::COUNTRY)
            .map_err(|_| ReconError::MissingColumn(COL::COUNTRY.into()))?
            .str()?;
        let population = df
            .column(COL::POPULATION)
            .map_err(|_| ReconError::MissingColumn(COL::POPULATION.into()))?
            .cast(&DataType::Float64)?;
        let table = countries
            .into_iter()
            .zip(population.f64()?)
            .filter_map(|(country, population)| Some((country?.to_string(), population?)))
            .collect();
        Ok(Self(table))
    }

    pub fn get(&self, country: &str) -> Result<f64> {
        self.0
            .get(country)
            .copied()
            .ok_or_else(|| ReconError::CountryNotFound(country.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PopulationTable {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Cases per 100,000 inhabitants: the latest cumulative confirmed count of `country` scaled by
/// its population.
pub fn incidence_rate(
    confirmed: &CaseSeries,
    population: &PopulationTable,
    country: &str,
) -> Result<f64> {
    let (date, latest) = confirmed
        .latest(country)?
        .ok_or_else(|| ReconError::NoObservations {
            metric: confirmed.metric.clone(),
            country: country.to_string(),
        })?;
    let population = population.get(country)?;
    debug!("Incidence for {country}: {latest} confirmed on {date}, population {population}");
    Ok(latest * PER_100K / population)
}

/// The parts of a contagion rate before the final division, so that several periods can be
/// added together first.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContagionComponents {
    /// Active cases over the period, times 100,000
    pub active_scaled: f64,
    /// Population that could still be infected during the period
    pub population_at_risk: f64,
}

impl ContagionComponents {
    /// Active cases per 100,000 of the population at risk. A population at risk of zero gives
    /// an infinite or NaN rate.
    pub fn rate(&self) -> f64 {
        self.active_scaled / self.population_at_risk
    }
}

impl Add for ContagionComponents {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            active_scaled: self.active_scaled + other.active_scaled,
            population_at_risk: self.population_at_risk + other.population_at_risk,
        }
    }
}

impl Sum for ContagionComponents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

fn delta(series: &CaseSeries, country: &str, start: NaiveDate, end: NaiveDate) -> Result<f64> {
    Ok(series.value_on(country, end)? - series.value_on(country, start)?)
}

/// The components of the contagion rate of `country` between `start` and `end`.
///
/// With the cumulative counts differenced over the period,
/// `active = confirmed - deaths - recovered` and
/// `population_at_risk = population - deaths - recovered - active`.
pub fn contagion_components(
    cases: &CaseSeriesSet,
    population: &PopulationTable,
    country: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ContagionComponents> {
    let confirmed = delta(cases.get(Metric::Confirmed)?, country, start, end)?;
    let recovered = delta(cases.get(Metric::Recovered)?, country, start, end)?;
    let deaths = delta(cases.get(Metric::Deaths)?, country, start, end)?;
    let population = population.get(country)?;

    let active = confirmed - deaths - recovered;
    let population_at_risk = population - deaths - recovered - active;
    debug!(
        "Contagion for {country} from {start} to {end}: active {active}, at risk {population_at_risk}"
    );
    Ok(ContagionComponents {
        active_scaled: active * PER_100K,
        population_at_risk,
    })
}

/// Active cases per 100,000 of the population at risk for `country` between `start` and `end`.
pub fn contagion_rate(
    cases: &CaseSeriesSet,
    population: &PopulationTable,
    country: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64> {
    Ok(contagion_components(cases, population, country, start, end)?.rate())
}
