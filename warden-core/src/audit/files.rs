//! Naming scheme for audit files.
//!
//! The active file for a day is `{prefix}{yyyyMMdd}.log`. Rotated files keep
//! the day and append the rotation instant:
//! `{prefix}{yyyyMMdd}_{yyyyMMddHHmmssfff}.log`.

use chrono::{DateTime, NaiveDate, Utc};

const EXTENSION: &str = ".log";

/// Where a file sits in a day's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum FileKind {
    Active,
    Rotated,
}

pub(crate) fn active_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}{}{EXTENSION}", day.format("%Y%m%d"))
}

pub(crate) fn rotated_file_name(
    prefix: &str,
    day: NaiveDate,
    rotated_at: DateTime<Utc>,
    attempt: u32,
) -> String {
    let stamp = rotated_at.format("%Y%m%d%H%M%S%3f");
    match attempt {
        0 => format!("{prefix}{}_{stamp}{EXTENSION}", day.format("%Y%m%d")),
        n => format!("{prefix}{}_{stamp}_{n}{EXTENSION}", day.format("%Y%m%d")),
    }
}

/// Recover the day and kind from a file name, or `None` if the name does not
/// belong to this prefix.
pub(crate) fn parse_file_name(prefix: &str, file_name: &str) -> Option<(NaiveDate, FileKind)> {
    let stem = file_name.strip_prefix(prefix)?.strip_suffix(EXTENSION)?;
    let day = NaiveDate::parse_from_str(stem.get(..8)?, "%Y%m%d").ok()?;
    match &stem[8..] {
        "" => Some((day, FileKind::Active)),
        rest if rest.starts_with('_') => Some((day, FileKind::Rotated)),
        _ => None,
    }
}
