//! Legacy per-site preference blobs
//!
//! Each legacy `sites` row stores its settings in four text columns. A blob is
//! base64 wrapping a PHP-serialized array; a NULL or empty blob is an empty
//! map. Blobs holding a JSON object instead are read as well.

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value as JsonValue};

use crate::error::{MigrationError, Result};
use crate::models::php_value;
use crate::services::rows::{Cell, Row};

pub const CHANNEL_PREFERENCES: &str = "site_channel_preferences";
pub const MEMBER_PREFERENCES: &str = "site_member_preferences";
pub const SYSTEM_PREFERENCES: &str = "site_system_preferences";
pub const TEMPLATE_PREFERENCES: &str = "site_template_preferences";

/// Blob columns in the order their entries are read
pub const PREFERENCE_COLUMNS: [&str; 4] = [
    CHANNEL_PREFERENCES,
    MEMBER_PREFERENCES,
    SYSTEM_PREFERENCES,
    TEMPLATE_PREFERENCES,
];

/// Decoded content of one blob. serde_json's map keeps keys sorted.
pub type Preferences = Map<String, JsonValue>;

pub fn decode(blob: Option<&str>) -> Result<Preferences> {
    let blob = match blob.map(str::trim) {
        None | Some("") => return Ok(Preferences::new()),
        Some(blob) => blob,
    };

    let bytes = STANDARD.decode(blob).map_err(|e| {
        MigrationError::RowTransformationFailed(format!("Preference blob is not base64: {}", e))
    })?;

    let value: JsonValue = if bytes.first() == Some(&b'{') {
        serde_json::from_slice(&bytes).map_err(|e| {
            MigrationError::RowTransformationFailed(format!(
                "Preference blob is not valid JSON: {}",
                e
            ))
        })?
    } else {
        php_value::from_bytes(&bytes).map_err(|e| {
            MigrationError::RowTransformationFailed(format!(
                "Preference blob is not PHP-serialized: {}",
                e
            ))
        })?
    };

    match value {
        JsonValue::Object(map) => Ok(map),
        // PHP has one array type, so a list is keyed by position
        JsonValue::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect()),
        other => Err(MigrationError::RowTransformationFailed(format!(
            "Preference blob is not an array: {}",
            other
        ))),
    }
}

/// base64 of the PHP-serialized array, the form the legacy application reads
pub fn encode(prefs: &Preferences) -> String {
    STANDARD.encode(php_value::to_string(&JsonValue::Object(prefs.clone())))
}

/// Text stored in `config.value` for a blob value
pub fn config_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The decoded blobs of one site, tracking which columns were changed
#[derive(Debug, Clone, PartialEq)]
pub struct SitePreferences {
    pub site_id: i64,
    blobs: BTreeMap<&'static str, Preferences>,
    dirty: BTreeSet<&'static str>,
}

impl SitePreferences {
    /// Decode the blob columns of a `sites` row. Columns absent from the row
    /// are left out.
    pub fn from_row(row: &Row) -> Result<Self> {
        let site_id = row.int("site_id")?;
        let mut blobs = BTreeMap::new();
        for column in PREFERENCE_COLUMNS {
            if row.get(column).is_some() {
                let prefs = decode(row.opt_text(column)?).map_err(|e| {
                    MigrationError::RowTransformationFailed(format!(
                        "Site {} {}: {}",
                        site_id, column, e
                    ))
                })?;
                blobs.insert(column, prefs);
            }
        }
        Ok(Self {
            site_id,
            blobs,
            dirty: BTreeSet::new(),
        })
    }

    /// Every `(column, key, value)` in column order, keys sorted within a column
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str, &JsonValue)> + '_ {
        PREFERENCE_COLUMNS.into_iter().flat_map(move |column| {
            self.blobs
                .get(column)
                .into_iter()
                .flat_map(move |prefs| prefs.iter().map(move |(k, v)| (column, k.as_str(), v)))
        })
    }

    /// Value of `key`; a later column shadows an earlier one
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        PREFERENCE_COLUMNS
            .iter()
            .rev()
            .filter_map(|column| self.blobs.get(column))
            .find_map(|prefs| prefs.get(key))
    }

    /// Set `key` in every column that already holds it, or in `fallback` if none does
    pub fn set(&mut self, key: &str, value: JsonValue, fallback: &'static str) {
        let holders: Vec<&'static str> = self
            .blobs
            .iter()
            .filter(|(_, prefs)| prefs.contains_key(key))
            .map(|(column, _)| *column)
            .collect();

        let targets = if holders.is_empty() {
            vec![fallback]
        } else {
            holders
        };

        for column in targets {
            let prefs = self.blobs.entry(column).or_default();
            if prefs.get(key) != Some(&value) {
                prefs.insert(key.to_string(), value.clone());
                self.dirty.insert(column);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Re-encoded blobs of the changed columns, ready for an UPDATE
    pub fn dirty_columns(&self) -> Vec<(String, Cell)> {
        self.dirty
            .iter()
            .filter_map(|column| {
                self.blobs
                    .get(column)
                    .map(|prefs| (column.to_string(), Cell::from(encode(prefs))))
            })
            .collect()
    }
}
