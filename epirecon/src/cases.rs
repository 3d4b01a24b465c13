//! Cumulative case count time series built from the raw `<metric>_global.csv` files.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info};
use polars::prelude::*;
use strum_macros::{Display, EnumString};

use crate::dates::{daily_range, format_short_date, parse_short_date};
use crate::error::{ReconError, Result};
use crate::frame::{self, DuplicateLabels};
use crate::source::{discover_case_files, read_case_file};
use crate::COL;

/// The case count metrics published as separate files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

/// A date-indexed table of cumulative counts with one column per country.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseSeries {
    pub metric: String,
    pub frame: DataFrame,
}

/// One country's series starting at its onset date.
#[derive(Clone, Debug, PartialEq)]
pub struct OnsetSeries {
    pub country: String,
    /// `None` when the country never exceeds the threshold
    pub onset: Option<NaiveDate>,
    pub values: Vec<Option<f64>>,
}

/// Build a `CaseSeries` from a raw case count table with columns
/// `{metadata...}, Country, date1, ..., dateN`.
///
/// The daily date range is reconstructed from the first and last date headers and each label
/// regenerated in the `M/D/YY` format, so missing, shuffled or duplicated raw columns cannot
/// corrupt the index. Headers that are not short dates, such as the `_duplicated_N` names given
/// to repeated headers, are ignored. Province rows of the same country are summed.
pub fn open_global_ts(raw: &DataFrame, metric: &str) -> Result<CaseSeries> {
    let column_names = raw.get_column_names();
    if !column_names.contains(&COL::COUNTRY) {
        return Err(ReconError::MissingColumn(COL::COUNTRY.into()));
    }
    let headers = column_names
        .iter()
        .filter_map(|name| parse_short_date(name).ok())
        .collect_vec();
    let (first, last) = match (headers.first(), headers.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ReconError::DateParse(format!(
                "no date columns in the {metric} file"
            )))
        }
    };

    let dates = daily_range(first, last)?;
    let labels = dates.iter().map(|date| format_short_date(*date)).collect_vec();
    debug!("Reconstructed {} dates for {metric}: {first} to {last}", dates.len());

    let frame = frame::transpose_by_label(raw, COL::COUNTRY, &labels, &dates, DuplicateLabels::Sum)?
        .sort([COL::DATE], SortMultipleOptions::default())?;
    Ok(CaseSeries {
        metric: metric.to_string(),
        frame,
    })
}

/// Realign onset series on the shared `dates` axis. Dates before a country's onset are null, as
/// is every date of a country that never reaches the threshold.
pub fn combine_on_date_axis(dates: &[NaiveDate], series: &[OnsetSeries]) -> Result<DataFrame> {
    let mut columns = vec![Series::new(COL::DATE, dates)];
    for onset_series in series {
        let leading = match onset_series.onset {
            Some(onset) => dates.iter().position(|date| *date == onset).ok_or_else(|| {
                ReconError::OnsetOutOfRange {
                    country: onset_series.country.clone(),
                    date: onset,
                }
            })?,
            None => dates.len(),
        };
        let values: Vec<Option<f64>> = std::iter::repeat(None)
            .take(leading)
            .chain(onset_series.values.iter().copied())
            .chain(std::iter::repeat(None))
            .take(dates.len())
            .collect();
        columns.push(Series::new(&onset_series.country, values));
    }
    Ok(DataFrame::new(columns)?)
}

/// Align onset series on days since onset: row `n` of the `day` column is the n-th day after
/// each country's onset, padded with trailing nulls.
pub fn align_by_days_since_onset(series: &[OnsetSeries]) -> Result<DataFrame> {
    let days = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let mut columns = vec![Series::new(COL::DAY, (0..days as u32).collect_vec())];
    for onset_series in series {
        let values: Vec<Option<f64>> = onset_series
            .values
            .iter()
            .copied()
            .chain(std::iter::repeat(None))
            .take(days)
            .collect();
        columns.push(Series::new(&onset_series.country, values));
    }
    Ok(DataFrame::new(columns)?)
}

impl CaseSeries {
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        frame::dates(&self.frame)
    }

    pub fn countries(&self) -> Vec<String> {
        frame::countries(&self.frame)
    }

    /// First and last date of the index, `None` for an empty table.
    pub fn date_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let dates = self.dates()?;
        Ok(dates.first().copied().zip(dates.last().copied()))
    }

    pub fn values(&self, country: &str) -> Result<Vec<Option<f64>>> {
        frame::country_values(&self.frame, country)
    }

    /// The cumulative count of `country` on `date`.
    pub fn value_on(&self, country: &str, date: NaiveDate) -> Result<f64> {
        let values = self.values(country)?;
        let row = self
            .dates()?
            .iter()
            .position(|d| *d == date)
            .ok_or_else(|| ReconError::DateNotFound {
                metric: self.metric.clone(),
                date,
            })?;
        values[row].ok_or_else(|| ReconError::MissingValue {
            metric: self.metric.clone(),
            country: country.to_string(),
            date,
        })
    }

    /// The most recent non-null observation of `country`.
    pub fn latest(&self, country: &str) -> Result<Option<(NaiveDate, f64)>> {
        let values = self.values(country)?;
        Ok(self
            .dates()?
            .into_iter()
            .zip(values)
            .filter_map(|(date, value)| value.map(|v| (date, v)))
            .last())
    }

    /// Split the table into one series per country, each starting at the first date the
    /// cumulative count exceeds `threshold`.
    pub fn since_onset_per_country(&self, threshold: f64) -> Result<Vec<OnsetSeries>> {
        let dates = self.dates()?;
        self.countries()
            .into_iter()
            .map(|country| {
                let values = self.values(&country)?;
                let start = values
                    .iter()
                    .position(|value| value.is_some_and(|v| v > threshold));
                Ok(match start {
                    Some(start) => OnsetSeries {
                        country,
                        onset: Some(dates[start]),
                        values: values[start..].to_vec(),
                    },
                    None => OnsetSeries {
                        country,
                        onset: None,
                        values: vec![],
                    },
                })
            })
            .collect()
    }

    /// The same table with every value before a country's onset replaced by null.
    pub fn since_onset(&self, threshold: f64) -> Result<CaseSeries> {
        let per_country = self.since_onset_per_country(threshold)?;
        Ok(CaseSeries {
            metric: self.metric.clone(),
            frame: combine_on_date_axis(&self.dates()?, &per_country)?,
        })
    }

    /// The table realigned on days since each country's onset, see `align_by_days_since_onset`.
    pub fn by_days_since_onset(&self, threshold: f64) -> Result<DataFrame> {
        align_by_days_since_onset(&self.since_onset_per_country(threshold)?)
    }
}

/// Every case count metric of a run, keyed by metric name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaseSeriesSet(pub BTreeMap<String, CaseSeries>);

impl CaseSeriesSet {
    /// Read and build every `<metric><suffix>` file in `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P, suffix: &str) -> Result<Self> {
        let mut set = BTreeMap::new();
        for case_file in discover_case_files(dir, suffix)? {
            let raw = read_case_file(&case_file.path)?;
            let series = open_global_ts(&raw, &case_file.metric)?;
            set.insert(case_file.metric, series);
        }
        Ok(Self(set))
    }

    pub fn insert(&mut self, series: CaseSeries) {
        self.0.insert(series.metric.clone(), series);
    }

    pub fn get(&self, metric: Metric) -> Result<&CaseSeries> {
        self.get_by_name(&metric.to_string())
    }

    pub fn get_by_name(&self, metric: &str) -> Result<&CaseSeries> {
        self.0
            .get(metric)
            .ok_or_else(|| ReconError::MetricNotFound(metric.to_string()))
    }

    pub fn confirmed(&self) -> Result<&CaseSeries> {
        self.get(Metric::Confirmed)
    }

    pub fn metrics(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Apply `CaseSeries::since_onset` to every metric.
    pub fn since_onset(&self, threshold: f64) -> Result<Self> {
        let set = self
            .0
            .iter()
            .map(|(metric, series)| Ok((metric.clone(), series.since_onset(threshold)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self(set))
    }

    /// Apply `CaseSeries::by_days_since_onset` to every metric.
    pub fn by_days_since_onset(&self, threshold: f64) -> Result<BTreeMap<String, DataFrame>> {
        self.0
            .iter()
            .map(|(metric, series)| Ok((metric.clone(), series.by_days_since_onset(threshold)?)))
            .collect()
    }

    /// Log the metrics available and the date range of the confirmed series.
    pub fn log_summary(&self) -> Result<()> {
        match self.confirmed()?.date_range()? {
            Some((first, last)) => info!(
                "Case time series for {:?} from {} to {}.",
                self.metrics(),
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            ),
            None => info!("Case time series for {:?} are empty.", self.metrics()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::str::FromStr;

    use polars::df;
    use tempfile::TempDir;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw_confirmed() -> DataFrame {
        df!(
            "Province/State" => &[None, Some("Ontario"), Some("Quebec"), None],
            COL::COUNTRY => &["Chile", "Canada", "Canada", "Fiji"],
            "Lat" => &[-35.6, 51.2, 52.9, -17.7],
            "1/22/20" => &[0i64, 1, 0, 0],
            "1/24/20" => &[5i64, 2, 2, 1],
            "1/23/20" => &[1i64, 1, 1, 0],
            "1/25/20" => &[9i64, 4, 3, 1]
        )
        .unwrap()
    }

    #[test]
    fn dates_should_be_reconstructed_from_headers() -> anyhow::Result<()> {
        let series = open_global_ts(&raw_confirmed(), "confirmed")?;
        let dates = series.dates()?;
        assert_eq!(
            dates,
            vec![ymd(2020, 1, 22), ymd(2020, 1, 23), ymd(2020, 1, 24), ymd(2020, 1, 25)]
        );
        assert_eq!(series.countries(), vec!["Chile", "Canada", "Fiji"]);
        assert_eq!(
            series.values("Chile")?,
            vec![Some(0.0), Some(1.0), Some(5.0), Some(9.0)]
        );
        // Provinces are summed
        assert_eq!(
            series.values("Canada")?,
            vec![Some(1.0), Some(2.0), Some(4.0), Some(7.0)]
        );
        Ok(())
    }

    #[test]
    fn missing_intermediate_date_column_should_fail() {
        let raw = raw_confirmed().drop("1/23/20").unwrap();
        assert!(matches!(
            open_global_ts(&raw, "confirmed"),
            Err(ReconError::MissingColumn(name)) if name == "1/23/20"
        ));
    }

    #[test]
    fn trailing_non_date_headers_should_be_ignored() -> anyhow::Result<()> {
        let raw = df!(
            COL::COUNTRY => &["Chile"],
            "1/22/20" => &[1i64],
            "1/23/20" => &[2i64],
            "notes" => &["n/a"]
        )?;
        let series = open_global_ts(&raw, "confirmed")?;
        assert_eq!(series.dates()?, vec![ymd(2020, 1, 22), ymd(2020, 1, 23)]);
        Ok(())
    }

    #[test]
    fn file_without_date_headers_should_fail() {
        let raw = df!(COL::COUNTRY => &["Chile"], "notes" => &["n/a"]).unwrap();
        assert!(matches!(
            open_global_ts(&raw, "confirmed"),
            Err(ReconError::DateParse(_))
        ));
    }

    fn read_raw(contents: &str) -> anyhow::Result<DataFrame> {
        let dir = TempDir::new()?;
        let path = dir.path().join("confirmed_global.csv");
        fs::write(&path, contents)?;
        Ok(read_case_file(&path)?)
    }

    #[test]
    fn duplicated_date_headers_should_not_corrupt_the_index() -> anyhow::Result<()> {
        let expected = vec![ymd(2020, 1, 22), ymd(2020, 1, 23), ymd(2020, 1, 24)];

        let middle = read_raw(
            "Province/State,Country/Region,1/22/20,1/23/20,1/23/20,1/24/20\n,Chile,1,2,2,4\n",
        )?;
        let series = open_global_ts(&middle, "confirmed")?;
        assert_eq!(series.dates()?, expected);
        assert_eq!(series.values("Chile")?, vec![Some(1.0), Some(2.0), Some(4.0)]);

        let last = read_raw(
            "Province/State,Country/Region,1/22/20,1/23/20,1/24/20,1/24/20\n,Chile,1,2,4,4\n",
        )?;
        let series = open_global_ts(&last, "confirmed")?;
        assert_eq!(series.dates()?, expected);
        assert_eq!(series.values("Chile")?, vec![Some(1.0), Some(2.0), Some(4.0)]);
        Ok(())
    }

    #[test]
    fn onset_should_trim_each_country() -> anyhow::Result<()> {
        let series = open_global_ts(&raw_confirmed(), "confirmed")?;
        let per_country = series.since_onset_per_country(2.0)?;
        assert_eq!(
            per_country[0],
            OnsetSeries {
                country: "Chile".into(),
                onset: Some(ymd(2020, 1, 24)),
                values: vec![Some(5.0), Some(9.0)],
            }
        );
        assert_eq!(per_country[1].onset, Some(ymd(2020, 1, 24)));
        assert_eq!(per_country[1].values, vec![Some(4.0), Some(7.0)]);
        // Fiji never exceeds the threshold
        assert_eq!(per_country[2].onset, None);
        assert!(per_country[2].values.is_empty());
        Ok(())
    }

    #[test]
    fn onset_table_should_keep_shared_date_axis() -> anyhow::Result<()> {
        let series = open_global_ts(&raw_confirmed(), "confirmed")?;
        let since_onset = series.since_onset(2.0)?;
        assert_eq!(since_onset.dates()?, series.dates()?);
        assert_eq!(
            since_onset.values("Chile")?,
            vec![None, None, Some(5.0), Some(9.0)]
        );
        assert_eq!(since_onset.values("Fiji")?, vec![None, None, None, None]);
        Ok(())
    }

    #[test]
    fn onset_outside_the_axis_should_name_the_country() {
        let series = vec![OnsetSeries {
            country: "Chile".into(),
            onset: Some(ymd(2021, 1, 1)),
            values: vec![Some(3.0)],
        }];
        assert!(matches!(
            combine_on_date_axis(&[ymd(2020, 1, 1)], &series),
            Err(ReconError::OnsetOutOfRange { country, .. }) if country == "Chile"
        ));
    }

    #[test]
    fn series_should_align_on_days_since_onset() -> anyhow::Result<()> {
        let series = open_global_ts(&raw_confirmed(), "confirmed")?;
        let aligned = series.by_days_since_onset(2.0)?;
        assert_eq!(aligned.get_column_names()[0], COL::DAY);
        assert_eq!(aligned.height(), 2);
        assert_eq!(frame::country_values(&aligned, "Chile")?, vec![Some(5.0), Some(9.0)]);
        assert_eq!(frame::country_values(&aligned, "Fiji")?, vec![None, None]);

        let mut set = CaseSeriesSet::default();
        set.insert(series);
        assert_eq!(set.by_days_since_onset(2.0)?["confirmed"].height(), 2);
        Ok(())
    }

    #[test]
    fn days_since_onset_should_pad_trailing_nulls() -> anyhow::Result<()> {
        let series = vec![
            OnsetSeries {
                country: "A".into(),
                onset: Some(ymd(2020, 1, 1)),
                values: vec![Some(3.0), Some(4.0), Some(6.0)],
            },
            OnsetSeries {
                country: "B".into(),
                onset: Some(ymd(2020, 1, 2)),
                values: vec![Some(5.0)],
            },
        ];
        let aligned = align_by_days_since_onset(&series)?;
        assert_eq!(aligned.height(), 3);
        assert_eq!(
            frame::country_values(&aligned, "B")?,
            vec![Some(5.0), None, None]
        );
        Ok(())
    }

    #[test]
    fn lookups_should_signal_distinct_errors() -> anyhow::Result<()> {
        let series = open_global_ts(&raw_confirmed(), "confirmed")?;
        assert_eq!(series.value_on("Chile", ymd(2020, 1, 23))?, 1.0);
        assert!(matches!(
            series.value_on("Atlantis", ymd(2020, 1, 23)),
            Err(ReconError::CountryNotFound(_))
        ));
        assert!(matches!(
            series.value_on("Chile", ymd(2021, 1, 1)),
            Err(ReconError::DateNotFound { .. })
        ));
        assert_eq!(series.latest("Canada")?, Some((ymd(2020, 1, 25), 7.0)));
        Ok(())
    }

    #[test]
    fn set_should_look_up_metrics() -> anyhow::Result<()> {
        let mut set = CaseSeriesSet::default();
        set.insert(open_global_ts(&raw_confirmed(), "confirmed")?);
        assert_eq!(set.metrics(), vec!["confirmed"]);
        assert!(set.confirmed().is_ok());
        assert!(matches!(
            set.get(Metric::Deaths),
            Err(ReconError::MetricNotFound(name)) if name == "deaths"
        ));
        assert_eq!(Metric::from_str("Recovered")?, Metric::Recovered);
        set.log_summary()?;
        Ok(())
    }
}
