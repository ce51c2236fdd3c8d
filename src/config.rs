use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("cannot parse last-run value '{value}' with date format '{format}'")]
pub(crate) struct ParseError {
    value: String,
    format: String,
    #[source]
    source: chrono::ParseError,
}

/// The stored last-run marker. The raw string is what the feed published and
/// what gets written back; the instant is derived from it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct LastRun(String);

impl LastRun {
    pub(crate) fn raw(&self) -> &str {
        &self.0
    }

    pub(crate) fn instant(&self, format: &str) -> Result<DateTime<Utc>, ParseError> {
        parse_with_format(&self.0, format).map_err(|source| ParseError {
            value: self.0.clone(),
            format: format.to_string(),
            source,
        })
    }
}

// Field order is the serialized key order, keep it alphabetical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) date_format: String,
    #[serde(rename = "date_last_run")]
    last_run: LastRun,
    pub(crate) new_episodes_dir: PathBuf,
    pub(crate) old_episodes_dir: PathBuf,
    pub(crate) rss_address: String,
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits valid UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Writes the config next to its final location first, then renames it
    /// over the old file so an interrupted save never truncates it.
    pub(crate) fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut body = self
            .to_json()
            .map_err(|err| write_err(io::Error::other(err)))?;
        body.push('\n');

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, body).map_err(write_err)?;
        fs::rename(&staging, path).map_err(write_err)
    }

    pub(crate) fn last_run(&self) -> &LastRun {
        &self.last_run
    }

    pub(crate) fn last_run_instant(&self) -> Result<DateTime<Utc>, ParseError> {
        self.last_run.instant(&self.date_format)
    }

    pub(crate) fn set_last_run(&mut self, raw: impl Into<String>) {
        self.last_run = LastRun(raw.into());
    }
}

/// Parses `value` with a strftime-style `format`. Formats without an offset
/// are read as UTC, and date-only formats as midnight UTC. A leading weekday
/// that disagrees with the date is ignored.
pub(crate) fn parse_with_format(
    value: &str,
    format: &str,
) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    parse_exact(value, format).or_else(|err| {
        let retry = format
            .strip_prefix("%a, ")
            .or_else(|| format.strip_prefix("%A, "))
            .zip(strip_weekday_word(value));
        match retry {
            Some((format, value)) => parse_exact(value, format).map_err(|_| err),
            None => Err(err),
        }
    })
}

/// `"Mon, 1 Jan 2022 ..."` → `"1 Jan 2022 ..."`.
pub(crate) fn strip_weekday_word(value: &str) -> Option<&str> {
    let (day, rest) = value.split_once(", ")?;
    (!day.is_empty() && day.chars().all(|ch| ch.is_ascii_alphabetic())).then_some(rest)
}

fn parse_exact(value: &str, format: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_str(value, format) {
        return Ok(dt.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(value, format) {
        Ok(naive) => Ok(naive.and_utc()),
        Err(err) => NaiveDate::parse_from_str(value, format)
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
            .map_err(|_| err),
    }
}
