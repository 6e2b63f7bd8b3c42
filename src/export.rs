//! CSV export of the current trend list.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::source::TrendItem;

/// Column order of [`to_csv`].
pub const CSV_HEADER: [&str; 7] = [
    "topic",
    "category",
    "volume_score",
    "sentiment",
    "location",
    "description",
    "timestamp",
];

/// Quote a field if it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let row = fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&row);
    out.push('\n');
}

/// Render items as CSV: a header row, then one row per item, each row
/// terminated by `\n`.
pub fn to_csv<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a TrendItem>,
{
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER);
    for item in items {
        push_row(
            &mut out,
            [
                item.topic.clone(),
                item.category.clone(),
                item.volume_score.to_string(),
                item.sentiment.to_string(),
                item.location.clone().unwrap_or_default(),
                item.description.clone(),
                item.timestamp.to_rfc3339(),
            ],
        );
    }
    out
}

/// Uppercase topics, one per line: the bare keyword list.
pub fn keywords<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a TrendItem>,
{
    items
        .into_iter()
        .map(|item| format!("{}\n", item.topic.to_uppercase()))
        .collect()
}

/// What an export file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Every column, see [`to_csv`].
    Table,
    /// Topics only, see [`keywords`].
    Keywords,
}

impl ExportFormat {
    fn render<'a, I>(self, items: I) -> String
    where
        I: IntoIterator<Item = &'a TrendItem>,
    {
        match self {
            ExportFormat::Table => to_csv(items),
            ExportFormat::Keywords => keywords(items),
        }
    }
}

/// `TRENDS_2026-01-31.csv`, or `TRENDS_2026-01-31_KEYWORDS.csv`.
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    match format {
        ExportFormat::Table => format!("TRENDS_{date}.csv"),
        ExportFormat::Keywords => format!("TRENDS_{date}_KEYWORDS.csv"),
    }
}

/// Write `items` into `dir` in the given format, creating `dir` if needed.
pub fn write_export<'a, I>(
    dir: &Path,
    format: ExportFormat,
    items: I,
    now: DateTime<Utc>,
) -> Result<PathBuf>
where
    I: IntoIterator<Item = &'a TrendItem>,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = dir.join(export_file_name(format, now.date_naive()));
    fs::write(&path, format.render(items))
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), ?format, "trends exported");
    Ok(path)
}
