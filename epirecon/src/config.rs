use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding every raw input file
    pub data_dir: PathBuf,
    /// Case count files are discovered as `<metric><case_file_suffix>`
    pub case_file_suffix: String,
    pub measures_workbook: String,
    pub wdi_series_file: String,
    pub wdi_data_file: String,
    pub population_file: String,
    /// A country's onset is the first date its cumulative count exceeds this value
    pub onset_threshold: f64,
    /// Number of non-data rows at the bottom of every policy sheet
    pub footer_rows: usize,
    /// Rows with fewer non-null cells than this fraction of the columns are dropped
    pub sparse_row_fraction: f64,
    /// The last `index_sheet_count` sheets of the workbook are indices, the rest measures
    pub index_sheet_count: usize,
    pub topic_keyword: String,
    /// Number of keyword topics the positional curation was written against
    pub expected_topic_count: usize,
    pub indicator_year: String,
}

impl Config {
    pub fn measures_workbook_path(&self) -> PathBuf {
        self.data_dir.join(&self.measures_workbook)
    }

    pub fn wdi_series_path(&self) -> PathBuf {
        self.data_dir.join(&self.wdi_series_file)
    }

    pub fn wdi_data_path(&self) -> PathBuf {
        self.data_dir.join(&self.wdi_data_file)
    }

    pub fn population_path(&self) -> PathBuf {
        self.data_dir.join(&self.population_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            case_file_suffix: "_global.csv".into(),
            measures_workbook: "OxCGRT_timeseries_all.xlsx".into(),
            wdi_series_file: "WDISeries.csv".into(),
            wdi_data_file: "WDIData.csv".into(),
            population_file: "population_2020.csv".into(),
            onset_threshold: 2.0,
            footer_rows: 3,
            sparse_row_fraction: 0.2,
            index_sheet_count: 4,
            topic_keyword: "Health".into(),
            expected_topic_count: 8,
            indicator_year: "2019".into(),
        }
    }
}
