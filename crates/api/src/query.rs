//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped in the repository layer.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?outcome=` filter of the CSV export.
#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub outcome: Option<String>,
}
