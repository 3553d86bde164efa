//! Table schema, column definitions, and persisted rows.

mod column;
mod row;
mod table;
pub mod validation;

pub use column::{Column, ColumnId, ColumnSpec, DataType, RowId, TableId};
pub use row::Row;
pub use table::TableSchema;
pub use validation::validate_new_column;

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
