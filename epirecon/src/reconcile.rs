//! Country name reconciliation between the sources and the case count files.

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::error::{ReconError, Result};

/// Names used by the policy response workbook that differ from the case count files.
const POLICY_INDEX_ALIASES: [(&str, &str); 7] = [
    ("Slovak Republic", "Slovakia"),
    ("Czech Republic", "Czechia"),
    ("Kyrgyz Republic", "Kyrgyzstan"),
    ("Cape Verde", "Cabo Verde"),
    ("Taiwan", "Taiwan*"),
    ("South Korea", "Korea, South"),
    ("United States", "US"),
];

/// Names used by the World Development Indicators that differ from the case count files.
const WORLD_BANK_ALIASES: [(&str, &str); 1] = [("United States", "US")];

/// A fixed mapping from a source's country label to the label used by the case count files.
/// Targets are never keys themselves, so applying the mapping is idempotent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountryAliases(BTreeMap<String, String>);

impl CountryAliases {
    pub fn new<I, K, V>(aliases: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: BTreeMap<String, String> = aliases
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some(target) = map.values().find(|target| map.contains_key(*target)) {
            return Err(ReconError::ChainedAlias(target.clone()));
        }
        Ok(Self(map))
    }

    pub fn policy_index() -> Self {
        // Unwrap: the fixed table has no chained aliases
        Self::new(POLICY_INDEX_ALIASES).unwrap()
    }

    pub fn world_bank() -> Self {
        // Unwrap: the fixed table has no chained aliases
        Self::new(WORLD_BANK_ALIASES).unwrap()
    }

    /// The canonical name for `name`, or `name` itself when it is not an alias.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rewrite the country labels in `column` using `aliases`, in a single pass.
pub fn reconcile(df: &DataFrame, column: &str, aliases: &CountryAliases) -> Result<DataFrame> {
    let renamed: StringChunked = df
        .column(column)
        .map_err(|_| ReconError::MissingColumn(column.to_string()))?
        .str()?
        .into_iter()
        .map(|name| name.map(|name| aliases.resolve(name)))
        .collect();
    let mut out = df.clone();
    out.with_column(renamed.with_name(column).into_series())?;
    Ok(out)
}
