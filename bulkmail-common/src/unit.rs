//! Recipient groups and the units of work handed to the delivery engine.
//!
//! Units are produced by the document pipeline: one unit per recipient group,
//! carrying the group's spreadsheet rows and the files generated for it. The
//! pipeline writes them to a RON manifest which [`load_manifest`] reads back.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading units of work.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Failed to read unit manifest from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse unit manifest: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Recipient group {0} has no rows")]
    EmptyGroup(usize),

    #[error("Group ID '{0}' was not found in the unit manifest")]
    GroupNotFound(String),
}

/// One spreadsheet row: column name to cell value.
///
/// A column that is present with an empty value is distinct from a column
/// that does not exist at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    #[must_use]
    pub const fn new(cells: BTreeMap<String, String>) -> Self {
        Self(cells)
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    #[must_use]
    pub fn value(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Template variables for this row.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Rows sharing one recipient group. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    group_column: Option<String>,
    rows: Vec<Row>,
}

impl RowGroup {
    /// Create a group, returning `None` when `rows` is empty.
    #[must_use]
    pub fn new(group_column: Option<String>, rows: Vec<Row>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        Some(Self { group_column, rows })
    }

    #[must_use]
    pub fn head_row(&self) -> &Row {
        &self.rows[0]
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Value of the group-id column on the head row, if the group has one.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        self.group_column
            .as_deref()
            .and_then(|column| self.head_row().value(column))
    }
}

/// A recipient group together with the files generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    group: RowGroup,
    attachments: Vec<PathBuf>,
}

impl UnitOfWork {
    #[must_use]
    pub const fn new(group: RowGroup, attachments: Vec<PathBuf>) -> Self {
        Self { group, attachments }
    }

    #[must_use]
    pub const fn group(&self) -> &RowGroup {
        &self.group
    }

    #[must_use]
    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    units: Vec<ManifestUnit>,
}

#[derive(Debug, Deserialize)]
struct ManifestUnit {
    #[serde(default)]
    group_column: Option<String>,
    rows: Vec<Row>,
    #[serde(default)]
    attachments: Vec<PathBuf>,
}

/// Parse a manifest, resolving relative attachment paths against `base`.
///
/// # Errors
///
/// Fails on malformed RON or when a unit has no rows.
pub fn parse_manifest(text: &str, base: &Path) -> Result<Vec<UnitOfWork>, UnitError> {
    let manifest: Manifest = ron::from_str(text)?;

    manifest
        .units
        .into_iter()
        .enumerate()
        .map(|(index, unit)| {
            let group = RowGroup::new(unit.group_column, unit.rows)
                .ok_or(UnitError::EmptyGroup(index))?;
            let attachments = unit
                .attachments
                .into_iter()
                .map(|path| if path.is_relative() { base.join(path) } else { path })
                .collect();
            Ok(UnitOfWork::new(group, attachments))
        })
        .collect()
}

/// Read the manifest file at `path`.
///
/// # Errors
///
/// See [`parse_manifest`]; additionally fails when the file cannot be read.
pub fn load_manifest(path: &Path) -> Result<Vec<UnitOfWork>, UnitError> {
    let text = std::fs::read_to_string(path).map_err(|source| UnitError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    parse_manifest(&text, base)
}

/// Drop every unit before the first one belonging to `group_id`.
///
/// Used to resume a run that stopped part way through.
///
/// # Errors
///
/// Returns [`UnitError::GroupNotFound`] when no unit has that group id.
pub fn starting_at(units: Vec<UnitOfWork>, group_id: &str) -> Result<Vec<UnitOfWork>, UnitError> {
    let start = units
        .iter()
        .position(|unit| unit.group().group_id() == Some(group_id))
        .ok_or_else(|| UnitError::GroupNotFound(group_id.to_string()))?;

    Ok(units.into_iter().skip(start).collect())
}
