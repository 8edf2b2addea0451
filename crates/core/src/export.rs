//! CSV export of per-address verification results.
//!
//! Output follows RFC 4180: CRLF record separators and double-quoted fields
//! where needed.

use crate::types::{JobId, Timestamp};

/// Record separator.
const CRLF: &str = "\r\n";

/// Header row of the results export.
pub const CSV_HEADER: &str = "email,outcome,reason,checked_at";

/// One exported result row.
#[derive(Debug, Clone, Copy)]
pub struct ExportRow<'a> {
    pub email: &'a str,
    pub outcome: &'a str,
    pub reason: Option<&'a str>,
    pub checked_at: Timestamp,
}

/// Escape a value for CSV: wrap in quotes if it contains comma, quote, or
/// newline.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Build the CSV document for a job's results, header included.
pub fn build_results_csv<'a>(rows: impl IntoIterator<Item = ExportRow<'a>>) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push_str(CRLF);
    for row in rows {
        out.push_str(&csv_escape(row.email));
        out.push(',');
        out.push_str(&csv_escape(row.outcome));
        out.push(',');
        out.push_str(&csv_escape(row.reason.unwrap_or("")));
        out.push(',');
        out.push_str(&row.checked_at.to_rfc3339());
        out.push_str(CRLF);
    }
    out
}

/// Download file name for a job's export.
///
/// Characters outside `[A-Za-z0-9_-]` are replaced so the id can be placed
/// inside a quoted `Content-Disposition` parameter.
pub fn export_filename(job_id: &JobId) -> String {
    let safe: String = job_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("job-{safe}-results.csv")
}
