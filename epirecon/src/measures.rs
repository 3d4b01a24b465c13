//! Government policy measures and indices, reshaped into date-indexed tables restricted to the
//! countries of the case series.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use polars::prelude::*;

use crate::config::Config;
use crate::dates::parse_flexible_date;
use crate::error::Result;
use crate::frame::{self, DuplicateLabels};
use crate::reconcile::{reconcile, CountryAliases};
use crate::source::{classify_sheets, sheet_semantic_name, SheetKind, SheetSource};
use crate::COL;

/// A policy sheet as a date-indexed table with one column per country.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureTable {
    pub name: String,
    pub kind: SheetKind,
    pub frame: DataFrame,
    /// Countries present in both the sheet and the case series
    pub countries: BTreeSet<String>,
}

impl MeasureTable {
    /// A table with no dates and no countries, used for sheets that could not be built.
    pub fn empty(name: &str, kind: SheetKind) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            kind,
            frame: frame::dates_only(&[])?,
            countries: BTreeSet::new(),
        })
    }
}

/// Drop the last `rows` rows.
pub fn drop_footer(df: &DataFrame, rows: usize) -> DataFrame {
    df.slice(0, df.height().saturating_sub(rows))
}

/// Keep only the rows whose non-null cell count reaches `fraction` of the column count.
pub fn drop_sparse_rows(df: &DataFrame, fraction: f64) -> Result<DataFrame> {
    let min_non_null = (df.width() as f64 * fraction).ceil() as usize;
    let mut non_null = vec![0usize; df.height()];
    for column in df.get_columns() {
        let present = column.is_not_null();
        for (count, present) in non_null.iter_mut().zip(&present) {
            if present.unwrap_or(false) {
                *count += 1;
            }
        }
    }
    let keep: Vec<bool> = non_null.iter().map(|count| *count >= min_non_null).collect();
    Ok(df.filter(&BooleanChunked::new("keep", keep))?)
}

/// Keep the rows whose `column` value is in `countries`, returning the matched names.
fn restrict_to_countries(
    df: &DataFrame,
    column: &str,
    countries: &BTreeSet<String>,
) -> Result<(DataFrame, BTreeSet<String>)> {
    let names = df.column(column)?.str()?;
    let keep: Vec<bool> = names
        .into_iter()
        .map(|name| name.is_some_and(|name| countries.contains(name)))
        .collect();
    let found: BTreeSet<String> = names
        .into_iter()
        .flatten()
        .filter(|name| countries.contains(*name))
        .map(str::to_string)
        .collect();
    Ok((df.filter(&BooleanChunked::new("keep", keep))?, found))
}

/// Build a `MeasureTable` from a raw policy sheet with columns
/// `CountryCode, CountryName, <date columns...>`.
pub fn build_measure_table(
    raw: &DataFrame,
    sheet_name: &str,
    kind: SheetKind,
    reference_countries: &BTreeSet<String>,
    config: &Config,
) -> Result<MeasureTable> {
    let name = sheet_semantic_name(sheet_name);
    let trimmed = drop_footer(raw, config.footer_rows);
    let dense = drop_sparse_rows(&trimmed, config.sparse_row_fraction)?;
    debug!(
        "Sheet '{sheet_name}': {} rows after dropping footer and sparse rows",
        dense.height()
    );
    let renamed = reconcile(&dense, COL::COUNTRY_NAME, &CountryAliases::policy_index())?;
    let (matched, countries) = restrict_to_countries(&renamed, COL::COUNTRY_NAME, reference_countries)?;

    let value_columns: Vec<String> = matched
        .get_column_names()
        .into_iter()
        .filter(|column| *column != COL::COUNTRY_CODE && *column != COL::COUNTRY_NAME)
        .map(str::to_string)
        .collect();
    let dates = value_columns
        .iter()
        .map(|label| parse_flexible_date(label))
        .collect::<Result<Vec<_>>>()?;
    let frame = frame::transpose_by_label(
        &matched,
        COL::COUNTRY_NAME,
        &value_columns,
        &dates,
        DuplicateLabels::First,
    )?;
    Ok(MeasureTable {
        name: name.to_string(),
        kind,
        frame,
        countries,
    })
}

/// Every measure and index table of the policy response workbook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyTables {
    pub measures: BTreeMap<String, MeasureTable>,
    pub indices: BTreeMap<String, MeasureTable>,
}

impl PolicyTables {
    /// The countries matched by each index sheet.
    pub fn index_countries(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.indices
            .iter()
            .map(|(name, table)| (name.clone(), table.countries.clone()))
            .collect()
    }
}

/// Build every non-flag sheet of `source`, logging one matched-country line per sheet. A sheet
/// that fails to build is logged and recorded as an empty table.
pub fn build_policy_tables<S: SheetSource>(
    source: &mut S,
    reference_countries: &BTreeSet<String>,
    config: &Config,
) -> Result<PolicyTables> {
    let mut tables = PolicyTables::default();
    for (sheet_name, kind) in classify_sheets(&source.sheet_names(), config.index_sheet_count) {
        if kind == SheetKind::Flag {
            debug!("Skipping flag sheet '{sheet_name}'");
            continue;
        }
        let table = source.sheet(&sheet_name).and_then(|raw| {
            build_measure_table(&raw, &sheet_name, kind, reference_countries, config)
        });
        let table = match table {
            Ok(table) => table,
            Err(err) => {
                warn!("Failed to build sheet '{sheet_name}': {err}");
                MeasureTable::empty(sheet_semantic_name(&sheet_name), kind)?
            }
        };
        info!(
            "For the index {:^30} there are {} countries in both the policy measures and the case series.",
            table.name,
            table.countries.len()
        );
        let target = match kind {
            SheetKind::Index => &mut tables.indices,
            _ => &mut tables.measures,
        };
        if let Some(previous) = target.insert(table.name.clone(), table) {
            warn!("Sheet '{sheet_name}' replaces an earlier '{}' table", previous.name);
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use polars::df;

    use super::*;
    use crate::error::ReconError;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reference() -> BTreeSet<String> {
        ["Chile", "Korea, South", "US", "Czechia"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn raw_sheet() -> DataFrame {
        df!(
            COL::COUNTRY_CODE => &[Some("CHL"), Some("KOR"), Some("FRA"), Some("XXX"), None, None, None],
            COL::COUNTRY_NAME => &[Some("Chile"), Some("South Korea"), Some("France"), Some("Nowhere"), Some("Source: OxCGRT"), None, None],
            "01Jan2020" => &[Some(0.0), Some(1.0), Some(0.0), None, None, None, None],
            "02Jan2020" => &[Some(10.5), Some(11.0), Some(2.0), None, None, None, None],
            "03Jan2020" => &[Some(20.0), None, Some(3.0), None, None, None, None]
        )
        .unwrap()
    }

    #[test]
    fn sparse_rows_should_be_dropped() -> anyhow::Result<()> {
        let df = df!(
            "a" => &[Some(1.0), None, Some(1.0)],
            "b" => &[Some(1.0), None, None],
            "c" => &[None::<f64>, None, None],
            "d" => &[None::<f64>, None, None],
            "e" => &[None::<f64>, None, None],
            "f" => &[None::<f64>, Some(1.0), None]
        )?;
        // 6 columns: at least ceil(6 / 5) = 2 non-null cells are required
        let dense = drop_sparse_rows(&df, 0.2)?;
        assert_eq!(dense.height(), 1);
        assert_eq!(dense.column("b")?.null_count(), 0);
        Ok(())
    }

    #[test]
    fn measure_table_should_be_transposed_and_filtered() -> anyhow::Result<()> {
        let table = build_measure_table(
            &raw_sheet(),
            "c1_schoolclosing",
            SheetKind::Measure,
            &reference(),
            &Config::default(),
        )?;
        assert_eq!(table.name, "schoolclosing");
        assert_eq!(
            table.countries,
            ["Chile", "Korea, South"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(frame::countries(&table.frame), vec!["Chile", "Korea, South"]);
        assert_eq!(
            frame::dates(&table.frame)?,
            vec![ymd(2020, 1, 1), ymd(2020, 1, 2), ymd(2020, 1, 3)]
        );
        assert_eq!(
            frame::country_values(&table.frame, "Korea, South")?,
            vec![Some(1.0), Some(11.0), None]
        );
        Ok(())
    }

    #[test]
    fn unmatched_sheet_should_yield_empty_table() -> anyhow::Result<()> {
        let table = build_measure_table(
            &raw_sheet(),
            "stringencyindex",
            SheetKind::Index,
            &BTreeSet::new(),
            &Config::default(),
        )?;
        assert!(table.countries.is_empty());
        assert!(frame::countries(&table.frame).is_empty());
        Ok(())
    }

    #[test]
    fn unparseable_date_header_should_fail() {
        let raw = df!(
            COL::COUNTRY_CODE => &["CHL"],
            COL::COUNTRY_NAME => &["Chile"],
            "sometime" => &[1.0]
        )
        .unwrap();
        let config = Config {
            footer_rows: 0,
            ..Config::default()
        };
        let result = build_measure_table(&raw, "x_y", SheetKind::Measure, &reference(), &config);
        assert!(matches!(result, Err(ReconError::DateParse(_))));
    }

    struct InMemorySheets(Vec<(String, DataFrame)>);

    impl SheetSource for InMemorySheets {
        fn sheet_names(&self) -> Vec<String> {
            self.0.iter().map(|(name, _)| name.clone()).collect()
        }

        fn sheet(&mut self, name: &str) -> Result<DataFrame> {
            self.0
                .iter()
                .find(|(sheet_name, _)| sheet_name == name)
                .map(|(_, df)| df.clone())
                .ok_or_else(|| ReconError::MissingColumn(name.to_string()))
        }
    }

    #[test]
    fn workbook_should_split_measures_indices_and_skip_flags() -> anyhow::Result<()> {
        let broken = df!(COL::COUNTRY_NAME => &["Chile"], "never" => &[1.0])?;
        // Matches countries but fails on its date headers
        let mut bad_dates = raw_sheet();
        bad_dates.rename("03Jan2020", "sometime")?;
        let mut sheets = InMemorySheets(vec![
            ("c1_schoolclosing".into(), raw_sheet()),
            ("c1_flag".into(), raw_sheet()),
            ("c2_workplaceclosing".into(), broken),
            ("c3_cancelpublicevents".into(), bad_dates),
            ("stringencyindex".into(), raw_sheet()),
        ]);
        let config = Config {
            index_sheet_count: 1,
            ..Config::default()
        };
        let tables = build_policy_tables(&mut sheets, &reference(), &config)?;
        assert_eq!(
            tables.measures.keys().collect::<Vec<_>>(),
            vec!["cancelpublicevents", "schoolclosing", "workplaceclosing"]
        );
        assert!(tables.measures["workplaceclosing"].countries.is_empty());
        assert!(tables.measures["cancelpublicevents"].countries.is_empty());
        assert!(frame::countries(&tables.measures["cancelpublicevents"].frame).is_empty());
        assert_eq!(tables.indices.keys().collect::<Vec<_>>(), vec!["stringencyindex"]);
        assert_eq!(tables.index_countries()["stringencyindex"].len(), 2);
        Ok(())
    }
}
