//! Readers turning the raw CSV and Excel inputs into polars `DataFrame`s.

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use log::{debug, info};
use polars::prelude::*;

use crate::dates::excel_serial_to_date;
use crate::error::{ReconError, Result};
use crate::COL;

/// Read a CSV file with a header row, inferring column types from every row.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    info!("Reading {}", path.display());
    let opts = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None);
    let df = opts.into_reader_with_file_handle(File::open(path)?).finish()?;
    debug!("Read {} with shape {:?}", path.display(), df.shape());
    Ok(df)
}

/// Read a cumulative case count file, normalising the country label column to `Country`.
pub fn read_case_file<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let mut df = read_csv(path)?;
    if df.get_column_names().contains(&COL::COUNTRY_REGION)
        && !df.get_column_names().contains(&COL::COUNTRY)
    {
        df.rename(COL::COUNTRY_REGION, COL::COUNTRY)?;
    }
    Ok(df)
}

/// A case count file found on disk together with the metric it holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseFile {
    pub metric: String,
    pub path: PathBuf,
}

/// Find every `<metric><suffix>` file in `dir`, sorted by path. The metric is the file name up
/// to the first `_`.
pub fn discover_case_files<P: AsRef<Path>>(dir: P, suffix: &str) -> Result<Vec<CaseFile>> {
    let pattern = dir.as_ref().join(format!("*{suffix}"));
    let pattern = pattern.to_string_lossy().to_string();
    let mut files = vec![];
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let metric = name.split('_').next().unwrap_or(name).to_string();
        files.push(CaseFile { metric, path });
    }
    if files.is_empty() {
        return Err(ReconError::NoCaseFiles(pattern));
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// How a sheet of the policy response workbook is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SheetKind {
    /// Raw per-date measure values
    Measure,
    /// Composite policy indices, always the trailing sheets of the workbook
    Index,
    /// Annotation sheets that are never processed
    Flag,
}

/// Classify every sheet name: the last `index_sheet_count` sheets are indices, the rest measures,
/// and anything mentioning `flag` is skipped.
pub fn classify_sheets(sheet_names: &[String], index_sheet_count: usize) -> Vec<(String, SheetKind)> {
    let first_index = sheet_names.len().saturating_sub(index_sheet_count);
    sheet_names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let kind = if name.contains("flag") {
                SheetKind::Flag
            } else if position >= first_index {
                SheetKind::Index
            } else {
                SheetKind::Measure
            };
            (name.clone(), kind)
        })
        .collect()
}

/// The semantic name of a sheet: the part after the last `_`.
pub fn sheet_semantic_name(sheet_name: &str) -> &str {
    sheet_name.rsplit('_').next().unwrap_or(sheet_name)
}

enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Float(n) => Cell::Number(*n),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.into()),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => match s.trim().parse::<f64>() {
                Ok(n) => Cell::Number(n),
                Err(_) => Cell::Text(s.clone()),
            },
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(format!("#{e:?}")),
        }
    }
}

fn header_label(data: &Data, position: usize) -> String {
    match data {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::Empty => format!("column_{position}"),
        Data::Float(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        other => other.to_string(),
    }
}

fn column_to_series(name: &str, cells: Vec<Cell>) -> Series {
    let all_numeric = cells
        .iter()
        .all(|cell| matches!(cell, Cell::Empty | Cell::Number(_)));
    if all_numeric {
        let values: Vec<Option<f64>> = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Empty => None,
                Cell::Number(n) => Some(n.to_string()),
                Cell::Text(s) => Some(s),
            })
            .collect();
        Series::new(name, values)
    }
}

/// Anything that can hand out named sheets as `DataFrame`s.
pub trait SheetSource {
    /// Sheet names in source order.
    fn sheet_names(&self) -> Vec<String>;
    fn sheet(&mut self, name: &str) -> Result<DataFrame>;
}

/// An opened Excel workbook.
pub struct Workbook {
    sheets: Sheets<std::io::BufReader<File>>,
}

impl Workbook {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening workbook {}", path.as_ref().display());
        Ok(Self {
            sheets: open_workbook_auto(path)?,
        })
    }
}

impl SheetSource for Workbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    /// Read a sheet into a `DataFrame` using its first row as the header.
    fn sheet(&mut self, name: &str) -> Result<DataFrame> {
        let range = self.sheets.worksheet_range(name)?;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(DataFrame::empty());
        };
        let names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(position, data)| header_label(data, position))
            .collect();
        let mut columns: Vec<Vec<Cell>> = names.iter().map(|_| vec![]).collect();
        for row in rows {
            for (position, column) in columns.iter_mut().enumerate() {
                column.push(row.get(position).map(Cell::from).unwrap_or(Cell::Empty));
            }
        }
        let series: Vec<Series> = names
            .iter()
            .zip(columns)
            .map(|(name, cells)| column_to_series(name, cells))
            .collect();
        let df = DataFrame::new(series)?;
        debug!("Sheet '{name}' has shape {:?}", df.shape());
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn case_file_country_region_should_be_renamed() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("confirmed_global.csv");
        let mut file = File::create(&path)?;
        writeln!(file, "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20")?;
        writeln!(file, ",Chile,-35.6,-71.5,0,3")?;
        writeln!(file, "Ontario,Canada,51.2,-85.3,1,4")?;
        drop(file);

        let df = read_case_file(&path)?;
        assert_eq!(df.shape(), (2, 6));
        assert!(df.column(COL::COUNTRY).is_ok());
        assert!(df.column(COL::COUNTRY_REGION).is_err());
        Ok(())
    }

    #[test]
    fn late_decimal_values_should_not_break_inference() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("WDIData.csv");
        let mut contents = String::from("Country Name,Indicator Name,2018,2019\n");
        for i in 0..1500 {
            contents.push_str(&format!("Country{i},I1,{i},{i}\n"));
        }
        contents.push_str("Chile,I1,1.5,2.5\n");
        fs::write(&path, contents)?;

        let df = read_csv(&path)?;
        assert_eq!(df.height(), 1501);
        assert_eq!(df.column("2018")?.dtype(), &DataType::Float64);
        assert_eq!(df.column("2019")?.f64()?.get(1500), Some(2.5));
        Ok(())
    }

    #[test]
    fn case_files_should_be_discovered_by_suffix() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        for name in ["deaths_global.csv", "confirmed_global.csv", "population.csv"] {
            File::create(dir.path().join(name))?;
        }
        let files = discover_case_files(dir.path(), "_global.csv")?;
        let metrics: Vec<&str> = files.iter().map(|f| f.metric.as_str()).collect();
        assert_eq!(metrics, vec!["confirmed", "deaths"]);
        Ok(())
    }

    #[test]
    fn no_case_files_should_be_an_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        assert!(matches!(
            discover_case_files(dir.path(), "_global.csv"),
            Err(ReconError::NoCaseFiles(_))
        ));
        Ok(())
    }

    #[test]
    fn sheets_should_be_classified_by_position_and_flag() {
        let names: Vec<String> = [
            "c1_schoolclosing",
            "c1_flag",
            "c2_workplaceclosing",
            "stringencyindex",
            "government_response_index",
            "containment_health_index",
            "economic_support_index",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let kinds: Vec<SheetKind> = classify_sheets(&names, 4)
            .into_iter()
            .map(|(_, kind)| kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SheetKind::Measure,
                SheetKind::Flag,
                SheetKind::Measure,
                SheetKind::Index,
                SheetKind::Index,
                SheetKind::Index,
                SheetKind::Index,
            ]
        );
    }

    #[test]
    fn semantic_name_is_the_last_underscore_suffix() {
        assert_eq!(sheet_semantic_name("c1_schoolclosing"), "schoolclosing");
        assert_eq!(sheet_semantic_name("stringencyindex"), "stringencyindex");
        assert_eq!(sheet_semantic_name("government_response_index"), "index");
    }

    #[test]
    fn mixed_columns_should_become_strings() {
        let numeric = column_to_series("a", vec![Cell::Number(1.0), Cell::Empty]);
        assert_eq!(numeric.dtype(), &DataType::Float64);
        assert_eq!(numeric.null_count(), 1);
        let text = column_to_series("b", vec![Cell::Text("Chile".into()), Cell::Number(2.0)]);
        assert_eq!(text.dtype(), &DataType::String);
    }
}
