//! Column creation rules.

use super::column::{ColumnSpec, DataType};
use super::table::TableSchema;
use crate::config::EngineConfig;
use crate::error::{Result, SchemaError};

/// Validates a column creation request against the table's current columns.
///
/// Checks, in order: non-empty name, case-insensitive trimmed name
/// uniqueness, the single-primary-key rule, the non-primary column cap, and
/// the LOOKUP/FORMULA definitions. The cap applies at creation only; tables
/// already over the limit are left alone.
///
/// # Arguments
/// * `schema` - Current schema of the target table
/// * `spec` - Requested column
/// * `config` - Engine limits
///
/// # Returns
/// `Result<(), SchemaError>` indicating whether the column may be created.
pub fn validate_new_column(
    schema: &TableSchema,
    spec: &ColumnSpec,
    config: &EngineConfig,
) -> Result<()> {
    let name = spec.name.trim();
    if name.is_empty() {
        return Err(SchemaError::EmptyName);
    }

    if schema.column_named_like(name).is_some() {
        return Err(SchemaError::DuplicateName {
            table: schema.table_id,
            name: name.to_string(),
        });
    }

    if spec.is_primary {
        if schema.has_primary_column() {
            return Err(SchemaError::SchemaLimit {
                table: schema.table_id,
                reason: "table already has a primary key column".to_string(),
            });
        }
    } else if schema.non_primary_column_count() >= config.max_non_primary_columns {
        return Err(SchemaError::SchemaLimit {
            table: schema.table_id,
            reason: format!(
                "at most {} non-primary columns allowed",
                config.max_non_primary_columns
            ),
        });
    }

    match spec.data_type {
        DataType::Lookup if spec.lookup_target_table_id.is_none() => {
            Err(SchemaError::InvalidLookup {
                column: name.to_string(),
                reason: "no target table".to_string(),
            })
        }
        DataType::Formula => {
            let ast = spec
                .formula_definition
                .as_ref()
                .ok_or_else(|| SchemaError::InvalidFormula {
                    column: name.to_string(),
                    reason: "missing definition".to_string(),
                })?;
            ast.validate_shape(schema)
                .map_err(|reason| SchemaError::InvalidFormula {
                    column: name.to_string(),
                    reason,
                })
        }
        _ => Ok(()),
    }
}
