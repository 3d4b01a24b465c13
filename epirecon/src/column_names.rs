//! This module stores the column names shared by the raw sources and the reconciled tables. Note
//! that the raw names must be kept in sync with the headers used by the upstream data publishers!

/// Row axis of every date-indexed table.
pub const DATE: &str = "date";
/// Row axis of tables aligned on days since onset.
pub const DAY: &str = "day";

// Case count files
pub const COUNTRY: &str = "Country";
pub const COUNTRY_REGION: &str = "Country/Region";

// Policy response workbook
pub const COUNTRY_CODE: &str = "CountryCode";
pub const COUNTRY_NAME: &str = "CountryName";

// World Development Indicators catalogue and data
pub const TOPIC: &str = "Topic";
pub const INDICATOR_NAME: &str = "Indicator Name";
pub const WDI_COUNTRY_NAME: &str = "Country Name";

// Population reference table
pub const POPULATION: &str = "Population (2020)";
