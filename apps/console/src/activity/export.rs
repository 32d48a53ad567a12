use serde::Serialize;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::models::MirrorEvent;

const CSV_HEADER: [&str; 6] = [
    "Timestamp",
    "Message",
    "Status",
    "Repository",
    "Organization",
    "Details",
];
const FILE_STEM: &str = "mirror-activity";

const HUMAN_TIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
const FILE_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv;charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub contents: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("当前筛选条件下没有可导出的活动")]
    Empty,
    #[error("JSON 序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("时间格式化失败: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRecord<'a> {
    #[serde(flatten)]
    event: &'a MirrorEvent,
    formatted_time: String,
}

pub fn export<'a, I>(format: ExportFormat, events: I, today: Date) -> Result<ExportFile, ExportError>
where
    I: IntoIterator<Item = &'a MirrorEvent>,
{
    match format {
        ExportFormat::Csv => export_csv(events, today),
        ExportFormat::Json => export_json(events, today),
    }
}

pub fn export_csv<'a, I>(events: I, today: Date) -> Result<ExportFile, ExportError>
where
    I: IntoIterator<Item = &'a MirrorEvent>,
{
    let mut rows = vec![CSV_HEADER.join(",")];

    for event in events {
        let fields = [
            format_timestamp(event.timestamp)?,
            event.message.clone(),
            event.status.as_str().to_string(),
            event.repository_name.clone().unwrap_or_default(),
            event.organization_name.clone().unwrap_or_default(),
            event.details.clone().unwrap_or_default(),
        ];
        rows.push(
            fields
                .iter()
                .map(|value| csv_escape(value))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    if rows.len() == 1 {
        return Err(ExportError::Empty);
    }

    Ok(ExportFile {
        filename: export_filename(ExportFormat::Csv, today)?,
        mime_type: ExportFormat::Csv.mime_type(),
        contents: rows.join("\n"),
    })
}

pub fn export_json<'a, I>(events: I, today: Date) -> Result<ExportFile, ExportError>
where
    I: IntoIterator<Item = &'a MirrorEvent>,
{
    let records = events
        .into_iter()
        .map(|event| {
            Ok(JsonRecord {
                event,
                formatted_time: format_timestamp(event.timestamp)?,
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    if records.is_empty() {
        return Err(ExportError::Empty);
    }

    Ok(ExportFile {
        filename: export_filename(ExportFormat::Json, today)?,
        mime_type: ExportFormat::Json.mime_type(),
        contents: serde_json::to_string_pretty(&records)?,
    })
}

pub fn export_filename(format: ExportFormat, today: Date) -> Result<String, ExportError> {
    Ok(format!(
        "{FILE_STEM}-{}.{}",
        today.format(FILE_DATE)?,
        format.extension()
    ))
}

pub fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp
        .to_offset(time::UtcOffset::UTC)
        .format(HUMAN_TIME)
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
