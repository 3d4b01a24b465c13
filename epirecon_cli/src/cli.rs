use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{command, Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use epirecon::cases::{CaseSeriesSet, Metric};
use epirecon::{config::Config, rates, Epirecon};
use log::{debug, info};
use polars::prelude::*;
use strum_macros::EnumString;

use crate::display::{display_case_summary, display_indicators, display_policy_tables, display_rates};
use crate::error::EpireconCliResult;

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()>;
}

fn load_cases(epirecon: &Epirecon, since_onset: bool) -> EpireconCliResult<CaseSeriesSet> {
    let cases = epirecon.case_series()?;
    if since_onset {
        Ok(cases.since_onset(epirecon.config.onset_threshold)?)
    } else {
        Ok(cases)
    }
}

/// How the case tables are indexed.
#[derive(Clone, Copy, Debug, Default, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum Alignment {
    /// Calendar dates shared by every country
    #[default]
    Date,
    /// Days since each country's onset
    Days,
}

/// The `cases` command summarises the case count files of the data directory.
#[derive(Args, Debug)]
pub struct CasesCommand {
    #[arg(
        long,
        help = "Null out the values before each country's onset (first value above the threshold)"
    )]
    since_onset: bool,
    #[arg(
        long,
        value_name = "date|days",
        default_value = "date",
        help = "Index of the output table: calendar dates, or days since each country's onset"
    )]
    align: Alignment,
    #[arg(
        short = 'm',
        long,
        requires = "output_file",
        help = "Metric to write to the output file, e.g. confirmed"
    )]
    metric: Option<Metric>,
    #[arg(short = 'o', long, help = "Write the selected metric as CSV to this file")]
    output_file: Option<PathBuf>,
}

impl RunCommand for CasesCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()> {
        info!("Running `cases` subcommand");
        let epirecon = Epirecon::new_with_config(config);
        let cases = load_cases(&epirecon, self.since_onset)?;
        display_case_summary(&cases)?;
        if let Some(output_file) = &self.output_file {
            let metric = self.metric.unwrap_or(Metric::Confirmed);
            let series = cases.get(metric)?;
            let mut frame = match self.align {
                Alignment::Date => series.frame.clone(),
                Alignment::Days => series.by_days_since_onset(epirecon.config.onset_threshold)?,
            };
            debug!("Writing {metric} to {}", output_file.display());
            let mut file = File::create(output_file).context("Failed to write output")?;
            CsvWriter::new(&mut file).finish(&mut frame)?;
        }
        Ok(())
    }
}

/// The `measures` command builds the policy measure and index tables.
#[derive(Args, Debug)]
pub struct MeasuresCommand;

impl RunCommand for MeasuresCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()> {
        info!("Running `measures` subcommand");
        let epirecon = Epirecon::new_with_config(config);
        let cases = epirecon.case_series()?;
        let policy = epirecon.policy_tables(&cases)?;
        display_policy_tables(&policy)?;
        Ok(())
    }
}

/// The `indicators` command selects the development indicators of the configured topic.
#[derive(Args, Debug)]
pub struct IndicatorsCommand {
    #[arg(short = 'n', long, help = "Maximum number of rows to display")]
    max_results: Option<usize>,
}

impl RunCommand for IndicatorsCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()> {
        info!("Running `indicators` subcommand");
        let epirecon = Epirecon::new_with_config(config);
        let cases = epirecon.case_series()?;
        let selection = epirecon.indicators(&cases)?;
        display_indicators(&selection, &epirecon.config.indicator_year, self.max_results)?;
        Ok(())
    }
}

/// The `rates` command computes the incidence rate of a country, and its contagion rate over a
/// period when one is given.
#[derive(Args, Debug)]
pub struct RatesCommand {
    #[arg(short = 'c', long, help = "Country name as it appears in the case series")]
    country: String,
    #[arg(long, requires = "end", help = "First date of the period, e.g. 2020-04-01")]
    start: Option<NaiveDate>,
    #[arg(long, requires = "start", help = "Last date of the period, e.g. 2020-04-30")]
    end: Option<NaiveDate>,
}

impl RunCommand for RatesCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()> {
        info!("Running `rates` subcommand");
        let epirecon = Epirecon::new_with_config(config);
        let cases = epirecon.case_series()?;
        let population = epirecon.population()?;
        let incidence = rates::incidence_rate(cases.confirmed()?, &population, &self.country)?;
        let contagion = match (self.start, self.end) {
            (Some(start), Some(end)) => Some((
                start,
                end,
                rates::contagion_components(&cases, &population, &self.country, start, end)?,
            )),
            _ => None,
        };
        display_rates(&self.country, incidence, contagion);
        Ok(())
    }
}

/// The `reconcile` command runs every stage and summarises the outcome.
#[derive(Args, Debug)]
pub struct ReconcileCommand;

impl RunCommand for ReconcileCommand {
    fn run(&self, config: Config) -> EpireconCliResult<()> {
        info!("Running `reconcile` subcommand");
        let epirecon = Epirecon::new_with_config(config);
        let data = epirecon.run()?;
        display_case_summary(&data.cases)?;
        display_policy_tables(&data.policy)?;
        display_indicators(&data.indicators, &epirecon.config.indicator_year, Some(10))?;
        println!("Population estimates for {} countries", data.population.len());
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Epirecon reconciles epidemic case counts with policy and development data", long_about = None, name="epirecon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        long,
        help = "Config file to use instead of the one in the user config directory",
        global = true
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'd',
        long,
        help = "Directory holding the input files, overriding the config",
        global = true
    )]
    pub data_dir: Option<PathBuf>,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command implements the RunCommand trait and specifies the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Summarise the case count time series
    Cases(CasesCommand),
    /// Summarise the policy measure and index tables
    Measures(MeasuresCommand),
    /// Show the selected development indicators
    Indicators(IndicatorsCommand),
    /// Compute incidence and contagion rates for a country
    Rates(RatesCommand),
    /// Run every stage
    Reconcile(ReconcileCommand),
}
