use std::collections::{BTreeMap, BTreeSet};

use cases::CaseSeriesSet;
use indicators::IndicatorSelection;
use log::debug;
use measures::PolicyTables;
use polars::frame::DataFrame;
use rates::PopulationTable;

use crate::config::Config;
use crate::error::Result;

// Re-exports
pub use column_names as COL;

// Modules
pub mod cases;
pub mod column_names;
pub mod config;
pub mod dates;
pub mod error;
pub mod frame;
pub mod indicators;
pub mod measures;
pub mod rates;
pub mod reconcile;
pub mod source;

/// Every table produced by a full reconciliation run.
#[derive(Debug)]
pub struct ReconciledData {
    pub cases: CaseSeriesSet,
    /// `cases` with the values before each country's onset nulled out
    pub cases_since_onset: CaseSeriesSet,
    /// Per metric, `cases` realigned on days since each country's onset
    pub cases_by_day: BTreeMap<String, DataFrame>,
    pub policy: PolicyTables,
    pub indicators: IndicatorSelection,
    pub population: PopulationTable,
}

/// Type for the reconciliation pipeline
#[derive(Debug, Default)]
pub struct Epirecon {
    pub config: Config,
}

impl Epirecon {
    /// Setup the pipeline with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the pipeline with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Read every case count file of the data directory
    pub fn case_series(&self) -> Result<CaseSeriesSet> {
        let cases = CaseSeriesSet::from_dir(&self.config.data_dir, &self.config.case_file_suffix)?;
        cases.log_summary()?;
        Ok(cases)
    }

    /// Countries of the confirmed case series, which every other source is matched against
    pub fn reference_countries(&self, cases: &CaseSeriesSet) -> Result<BTreeSet<String>> {
        Ok(cases.confirmed()?.countries().into_iter().collect())
    }

    /// Build the measure and index tables of the policy response workbook
    pub fn policy_tables(&self, cases: &CaseSeriesSet) -> Result<PolicyTables> {
        let mut workbook = source::Workbook::open(self.config.measures_workbook_path())?;
        measures::build_policy_tables(
            &mut workbook,
            &self.reference_countries(cases)?,
            &self.config,
        )
    }

    /// Select the topic indicators of the World Development Indicators
    pub fn indicators(&self, cases: &CaseSeriesSet) -> Result<IndicatorSelection> {
        let catalog = source::read_csv(self.config.wdi_series_path())?;
        let data = source::read_csv(self.config.wdi_data_path())?;
        indicators::select_indicators(
            &catalog,
            &data,
            &self.reference_countries(cases)?,
            &self.config,
        )
    }

    /// Load the population reference table
    pub fn population(&self) -> Result<PopulationTable> {
        PopulationTable::from_frame(&source::read_csv(self.config.population_path())?)
    }

    /// Run every stage in order
    pub fn run(&self) -> Result<ReconciledData> {
        let cases = self.case_series()?;
        let cases_since_onset = cases.since_onset(self.config.onset_threshold)?;
        let cases_by_day = cases.by_days_since_onset(self.config.onset_threshold)?;
        let policy = self.policy_tables(&cases)?;
        let indicators = self.indicators(&cases)?;
        let population = self.population()?;
        Ok(ReconciledData {
            cases,
            cases_since_onset,
            cases_by_day,
            policy,
            indicators,
            population,
        })
    }
}
