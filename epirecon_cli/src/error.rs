use epirecon::error::ReconError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum EpireconCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("epirecon error: {0}")]
    ReconError(#[from] ReconError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type EpireconCliResult<T> = Result<T, EpireconCliError>;
