use crate::error::AttributeError;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Time(DateTime<Local>),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl AttrValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Time(_) => "time",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Local>> for AttrValue {
    fn from(value: DateTime<Local>) -> Self {
        Self::Time(value)
    }
}

/// Per-file attribute bag filled in by the preprocessors before any
/// category predicate runs.
///
/// Reading a name nobody set is an error rather than a default, so a rule
/// that misspells an attribute fails loudly instead of quietly never matching.
#[derive(Debug, Clone)]
pub struct FileAttributes {
    name: String,
    path: PathBuf,
    values: BTreeMap<String, AttrValue>,
}

impl FileAttributes {
    pub fn new(folder: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: folder.join(name),
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.values.insert(key.into(), value.into());
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&AttrValue, AttributeError> {
        self.values
            .get(key)
            .ok_or_else(|| AttributeError::Undefined(key.to_string()))
    }

    #[cfg(test)]
    pub fn int(&self, key: &str) -> Result<i64, AttributeError> {
        match self.get(key)? {
            AttrValue::Int(v) => Ok(*v),
            other => Err(mismatch(key, "integer", other)),
        }
    }

    #[cfg(test)]
    pub fn bool(&self, key: &str) -> Result<bool, AttributeError> {
        match self.get(key)? {
            AttrValue::Bool(v) => Ok(*v),
            other => Err(mismatch(key, "boolean", other)),
        }
    }

    #[cfg(test)]
    pub fn text(&self, key: &str) -> Result<&str, AttributeError> {
        match self.get(key)? {
            AttrValue::Text(v) => Ok(v),
            other => Err(mismatch(key, "text", other)),
        }
    }

    #[cfg(test)]
    pub fn time(&self, key: &str) -> Result<DateTime<Local>, AttributeError> {
        match self.get(key)? {
            AttrValue::Time(v) => Ok(*v),
            other => Err(mismatch(key, "time", other)),
        }
    }
}

#[cfg(test)]
fn mismatch(key: &str, expected: &'static str, found: &AttrValue) -> AttributeError {
    AttributeError::TypeMismatch {
        name: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// A preprocessing step that computes attributes for one file.
pub trait Preprocessor {
    fn preprocess(&self, attrs: &mut FileAttributes) -> Result<(), AttributeError>;
}

impl<F> Preprocessor for F
where
    F: Fn(&mut FileAttributes) -> Result<(), AttributeError>,
{
    fn preprocess(&self, attrs: &mut FileAttributes) -> Result<(), AttributeError> {
        self(attrs)
    }
}

/// Stat-based attributes every policy can rely on.
#[derive(Debug, Clone, Copy)]
pub struct StatPreprocessor {
    today: NaiveDate,
}

impl StatPreprocessor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Preprocessor for StatPreprocessor {
    fn preprocess(&self, attrs: &mut FileAttributes) -> Result<(), AttributeError> {
        let meta = fs::metadata(attrs.path()).map_err(|err| {
            AttributeError::Invalid(format!("failed to stat {}: {err}", attrs.path().display()))
        })?;
        let modified: DateTime<Local> = meta
            .modified()
            .map_err(|err| {
                AttributeError::Invalid(format!(
                    "modification time unavailable for {}: {err}",
                    attrs.path().display()
                ))
            })?
            .into();
        let extension = attrs
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let name = attrs.name().to_string();
        let modified_date = modified.date_naive();

        attrs.set("name", name);
        attrs.set("is_dir", meta.is_dir());
        attrs.set("is_file", meta.is_file());
        attrs.set("size", i64::try_from(meta.len()).unwrap_or(i64::MAX));
        attrs.set("extension", extension);
        attrs.set("modified_time", modified);
        attrs.set("days_since_modified", days_between(modified_date, self.today));
        attrs.set(
            "months_since_modified",
            months_between(modified_date, self.today),
        );
        attrs.set(
            "weekday",
            i64::from(modified_date.weekday().num_days_from_sunday()),
        );
        attrs.set("weekday_name", modified.format("%a").to_string());
        Ok(())
    }
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Calendar months crossed between two dates; the day of month is ignored,
/// so Jan 31 -> Feb 1 counts as one month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year() - from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
