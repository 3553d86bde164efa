//! Persisted row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::column::{RowId, TableId};

/// One persisted row. `encoded_data` is only interpreted by the record codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Row identifier
    pub id: RowId,
    /// Owning table
    pub table_id: TableId,
    /// Encoded record blob
    pub encoded_data: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
