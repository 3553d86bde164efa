//! Column definition within a table.

use serde::{Deserialize, Serialize};

use crate::formula::FormulaAst;

/// Table identifier assigned by the backend.
pub type TableId = u64;
/// Column identifier assigned by the backend.
pub type ColumnId = u64;
/// Row identifier assigned by the backend.
pub type RowId = u64;

/// Declared data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Free-form text
    Text,
    /// Short string
    String,
    /// Image URL
    Image,
    /// Base-10 integer
    Integer,
    /// Signed decimal number
    Real,
    /// true/false
    Boolean,
    /// ISO calendar date (`yyyy-mm-dd`)
    Date,
    /// Reference to a primary key in another table
    Lookup,
    /// Server-computed expression over numeric columns
    Formula,
}

impl DataType {
    /// Returns `true` for INTEGER and REAL. FORMULA is not numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Real)
    }

    /// Returns `true` for types whose values are kept as text.
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::Text | DataType::String | DataType::Image)
    }

    /// Upper-case type name as persisted by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "TEXT",
            DataType::String => "STRING",
            DataType::Image => "IMAGE",
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Lookup => "LOOKUP",
            DataType::Formula => "FORMULA",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column definition within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column identifier
    pub id: ColumnId,
    /// Owning table
    pub table_id: TableId,
    /// Column name, unique within the table
    pub name: String,
    /// Declared type
    pub data_type: DataType,
    /// Whether this column is the table's primary key
    #[serde(default)]
    pub is_primary: bool,
    /// Whether an empty value is accepted
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    /// Whether the backend assigns this primary key on insert
    #[serde(default)]
    pub is_auto_generated: bool,
    /// Target table of a LOOKUP column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_target_table_id: Option<TableId>,
    /// Display column in the target table of a LOOKUP column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_target_column_id: Option<ColumnId>,
    /// Expression of a FORMULA column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_definition: Option<FormulaAst>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Builds a column from a creation request and backend-assigned ids.
    pub fn from_spec(id: ColumnId, table_id: TableId, spec: ColumnSpec) -> Self {
        Self {
            id,
            table_id,
            name: spec.name.trim().to_string(),
            data_type: spec.data_type,
            is_primary: spec.is_primary,
            is_nullable: spec.is_nullable && !spec.is_primary,
            is_auto_generated: spec.is_primary && spec.is_auto_generated,
            lookup_target_table_id: spec.lookup_target_table_id,
            lookup_target_column_id: spec.lookup_target_column_id,
            formula_definition: spec.formula_definition,
        }
    }

    /// Returns `true` when the key is typed in by the user rather than assigned.
    pub fn is_manual_key(&self) -> bool {
        self.is_primary && !self.is_auto_generated
    }
}

/// Column creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Requested column name
    pub name: String,
    /// Declared type
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_target_table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_target_column_id: Option<ColumnId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_definition: Option<FormulaAst>,
}

impl ColumnSpec {
    /// Creates a nullable, non-primary column request.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_primary: false,
            is_nullable: true,
            is_auto_generated: false,
            lookup_target_table_id: None,
            lookup_target_column_id: None,
            formula_definition: None,
        }
    }

    /// Marks the column as the primary key.
    pub fn primary(mut self, auto_generated: bool) -> Self {
        self.is_primary = true;
        self.is_nullable = false;
        self.is_auto_generated = auto_generated;
        self
    }

    /// Marks the column as non-nullable.
    pub fn required(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Points a LOOKUP column at a target table and optional display column.
    pub fn lookup(mut self, table_id: TableId, display_column: Option<ColumnId>) -> Self {
        self.lookup_target_table_id = Some(table_id);
        self.lookup_target_column_id = display_column;
        self
    }

    /// Attaches a formula definition.
    pub fn formula(mut self, ast: FormulaAst) -> Self {
        self.formula_definition = Some(ast);
        self
    }
}
