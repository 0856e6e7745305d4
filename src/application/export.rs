//! CSV and Markdown serialization of archive records.
//!
//! Both encoders are pure: the same records, date format and generation time
//! always produce the same bytes.

use bytes::Bytes;
use time::OffsetDateTime;

use crate::domain::dates::{DateFormat, GENERATED_AT_FORMAT, format_iso_date};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::types::ExportFormat;

const FILENAME_STEM: &str = "content-archive";
const CSV_HEADER: [&str; 3] = ["Title", "Date", "URL"];

/// A generated download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub content: Bytes,
    pub filename: String,
    pub mime_type: &'static str,
}

pub fn generate(
    format: ExportFormat,
    records: &[PostRecord],
    date_format: &DateFormat,
    generated_at: OffsetDateTime,
) -> Result<ExportDocument, DomainError> {
    let content = match format {
        ExportFormat::Csv => render_csv(records, date_format)?,
        ExportFormat::Markdown => render_markdown(records, date_format, generated_at)?,
    };

    Ok(ExportDocument {
        format,
        content: Bytes::from(content),
        filename: export_filename(format, generated_at)?,
        mime_type: format.mime_type(),
    })
}

/// `content-archive-<YYYY-MM-DD>.<ext>` for the generation date.
pub fn export_filename(
    format: ExportFormat,
    generated_at: OffsetDateTime,
) -> Result<String, DomainError> {
    let day = format_iso_date(generated_at.date())?;
    Ok(format!("{FILENAME_STEM}-{day}.{}", format.extension()))
}

pub fn render_csv(records: &[PostRecord], date_format: &DateFormat) -> Result<String, DomainError> {
    let mut out = String::new();
    push_csv_line(&mut out, CSV_HEADER);
    for record in records {
        let date = date_format.format(record.published_at)?;
        push_csv_line(
            &mut out,
            [record.title.as_str(), date.as_str(), record.permalink.as_str()],
        );
    }
    Ok(out)
}

pub fn render_markdown(
    records: &[PostRecord],
    date_format: &DateFormat,
    generated_at: OffsetDateTime,
) -> Result<String, DomainError> {
    let stamp = generated_at
        .format(GENERATED_AT_FORMAT)
        .map_err(|err| DomainError::invariant(format!("failed to format export time: {err}")))?;

    let mut out = String::new();
    out.push_str("# Content Archive\n\n");
    out.push_str(&format!("Generated on {stamp}\n\n"));
    out.push_str("## Posts\n\n");
    for record in records {
        let date = date_format.format(record.published_at)?;
        out.push_str(&format!(
            "- [{}]({}) - {}\n",
            record.title, record.permalink, date
        ));
    }
    Ok(out)
}

fn push_csv_line<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        push_csv_field(out, field);
    }
    out.push('\n');
}

/// RFC 4180 quoting: fields containing a separator, quote or line break are
/// wrapped in quotes with inner quotes doubled.
fn push_csv_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
