//! Formula definitions for FORMULA columns.
//!
//! A formula is a single binary operation whose left operand is a numeric
//! column and whose right operand is a numeric column or a literal. The
//! builder only produces the AST; evaluation belongs to whichever backend
//! stores the rows.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::codec::Record;
use crate::schema::{ColumnId, TableSchema};
use crate::value;

/// Binary operator of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormulaOp {
    #[default]
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl FormulaOp {
    /// Parses `+`, `-`, `*` or `/`.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "+" => Some(FormulaOp::Add),
            "-" => Some(FormulaOp::Sub),
            "*" => Some(FormulaOp::Mul),
            "/" => Some(FormulaOp::Div),
            _ => None,
        }
    }

    /// Applies the operator. Division by zero has no result.
    pub fn apply(self, left: f64, right: f64) -> Option<f64> {
        let result = match self {
            FormulaOp::Add => left + right,
            FormulaOp::Sub => left - right,
            FormulaOp::Mul => left * right,
            FormulaOp::Div if right == 0.0 => return None,
            FormulaOp::Div => left / right,
        };
        result.is_finite().then_some(result)
    }
}

/// Serialized formula expression.
///
/// Encodes as `{"type":"operator","value":"+","left":{...},"right":{...}}`,
/// `{"type":"column","name":"Price"}` or `{"type":"literal","value":10}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormulaAst {
    Operator {
        value: FormulaOp,
        left: Box<FormulaAst>,
        right: Box<FormulaAst>,
    },
    Column {
        name: String,
    },
    Literal {
        value: Number,
    },
}

impl FormulaAst {
    /// Column reference node.
    pub fn column(name: impl Into<String>) -> Self {
        FormulaAst::Column { name: name.into() }
    }

    /// Literal node.
    pub fn literal(value: impl Into<Number>) -> Self {
        FormulaAst::Literal {
            value: value.into(),
        }
    }

    /// Operator node.
    pub fn operator(op: FormulaOp, left: FormulaAst, right: FormulaAst) -> Self {
        FormulaAst::Operator {
            value: op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Checks the definition against a table schema.
    ///
    /// The root must be an operator, its left operand a column reference and
    /// its right operand a column reference or literal. Every referenced
    /// column must be an INTEGER or REAL sibling.
    pub fn validate_shape(&self, schema: &TableSchema) -> Result<(), String> {
        let FormulaAst::Operator { left, right, .. } = self else {
            return Err("formula root must be an operator".to_string());
        };
        match left.as_ref() {
            FormulaAst::Column { name } => check_numeric(schema, name)?,
            _ => return Err("left operand must be a column".to_string()),
        }
        match right.as_ref() {
            FormulaAst::Column { name } => check_numeric(schema, name),
            FormulaAst::Literal { .. } => Ok(()),
            FormulaAst::Operator { .. } => {
                Err("right operand must be a column or literal".to_string())
            }
        }
    }

    /// Evaluates the formula against a decoded record.
    ///
    /// Operand columns are re-checked against the schema: a missing or
    /// non-numeric column, an unparseable value, or division by zero yields
    /// `None`.
    pub fn evaluate(&self, record: &Record, schema: &TableSchema) -> Option<f64> {
        match self {
            FormulaAst::Operator { value, left, right } => {
                let l = left.evaluate(record, schema)?;
                let r = right.evaluate(record, schema)?;
                value.apply(l, r)
            }
            FormulaAst::Column { name } => {
                let column = schema.column(name)?;
                if !column.data_type.is_numeric() {
                    return None;
                }
                record.get(name).and_then(value::as_number)
            }
            FormulaAst::Literal { value } => value.as_f64(),
        }
    }
}

fn check_numeric(schema: &TableSchema, name: &str) -> Result<(), String> {
    match schema.column(name) {
        Some(column) if column.data_type.is_numeric() => Ok(()),
        Some(column) => Err(format!(
            "column '{}' is {}, not INTEGER or REAL",
            name, column.data_type
        )),
        None => Err(format!("column '{}' does not exist", name)),
    }
}

/// Source of the right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RightMode {
    #[default]
    Column,
    Literal,
}

/// Incremental formula editor state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaBuilder {
    pub operator: FormulaOp,
    pub left_column_id: Option<ColumnId>,
    pub right_mode: RightMode,
    pub right_column_id: Option<ColumnId>,
    /// Raw literal text as typed
    pub right_literal: String,
}

impl FormulaBuilder {
    /// Creates an empty builder (`+`, right operand in column mode).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_operator(&mut self, op: FormulaOp) -> &mut Self {
        self.operator = op;
        self
    }

    pub fn set_left_column(&mut self, id: ColumnId) -> &mut Self {
        self.left_column_id = Some(id);
        self
    }

    /// Switches the right operand to a column.
    pub fn set_right_column(&mut self, id: ColumnId) -> &mut Self {
        self.right_mode = RightMode::Column;
        self.right_column_id = Some(id);
        self
    }

    /// Switches the right operand to a literal.
    pub fn set_right_literal(&mut self, text: impl Into<String>) -> &mut Self {
        self.right_mode = RightMode::Literal;
        self.right_literal = text.into();
        self
    }

    /// Clears all state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Produces the AST, or `None` while the definition is incomplete.
    ///
    /// Column ids resolve only against the schema's numeric columns, so an
    /// id naming a non-numeric column counts as unset.
    pub fn build(&self, schema: &TableSchema) -> Option<FormulaAst> {
        let numeric = schema.numeric_columns();
        let resolve = |id: Option<ColumnId>| {
            id.and_then(|id| numeric.iter().find(|c| c.id == id))
                .map(|c| FormulaAst::column(c.name.clone()))
        };

        let left = resolve(self.left_column_id)?;
        let right = match self.right_mode {
            RightMode::Column => resolve(self.right_column_id)?,
            RightMode::Literal => {
                FormulaAst::literal(value::parse_number_literal(&self.right_literal)?)
            }
        };
        Some(FormulaAst::operator(self.operator, left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnSpec, DataType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> TableSchema {
        let specs = [
            ColumnSpec::new("Id", DataType::Integer).primary(true),
            ColumnSpec::new("Price", DataType::Real),
            ColumnSpec::new("Qty", DataType::Integer),
            ColumnSpec::new("Name", DataType::Text),
        ];
        let columns = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Column::from_spec(i as u64 + 1, 1, spec))
            .collect();
        TableSchema::new(1, columns)
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_column_plus_literal() {
        let mut builder = FormulaBuilder::new();
        builder
            .set_left_column(2)
            .set_operator(FormulaOp::Add)
            .set_right_literal("10");
        let ast = builder.build(&schema()).unwrap();
        assert_eq!(
            serde_json::to_value(&ast).unwrap(),
            json!({
                "type": "operator",
                "value": "+",
                "left": {"type": "column", "name": "Price"},
                "right": {"type": "literal", "value": 10}
            })
        );
    }

    #[test]
    fn test_build_column_times_column() {
        let mut builder = FormulaBuilder::new();
        builder
            .set_left_column(2)
            .set_operator(FormulaOp::Mul)
            .set_right_column(3);
        assert_eq!(
            builder.build(&schema()),
            Some(FormulaAst::operator(
                FormulaOp::Mul,
                FormulaAst::column("Price"),
                FormulaAst::column("Qty")
            ))
        );
    }

    #[test]
    fn test_build_incomplete_returns_none() {
        let schema = schema();
        let mut builder = FormulaBuilder::new();
        assert_eq!(builder.build(&schema), None);

        builder.set_left_column(2);
        assert_eq!(builder.build(&schema), None, "right unset");

        builder.set_right_literal("abc");
        assert_eq!(builder.build(&schema), None, "literal unparseable");

        builder.set_right_literal("");
        assert_eq!(builder.build(&schema), None, "literal empty");

        builder.set_right_column(4);
        assert_eq!(builder.build(&schema), None, "TEXT column is not numeric");

        builder.reset();
        builder.set_right_column(3);
        assert_eq!(builder.build(&schema), None, "left unset");
    }

    #[test]
    fn test_ast_deserializes_deterministically() {
        let text = r#"{"type":"operator","value":"/","left":{"type":"column","name":"Price"},"right":{"type":"literal","value":2.5}}"#;
        let ast: FormulaAst = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_string(&ast).unwrap(), text);
    }

    #[test]
    fn test_validate_shape() {
        let schema = schema();
        let ok = FormulaAst::operator(
            FormulaOp::Sub,
            FormulaAst::column("Price"),
            FormulaAst::column("Qty"),
        );
        assert!(ok.validate_shape(&schema).is_ok());

        let text_operand = FormulaAst::operator(
            FormulaOp::Add,
            FormulaAst::column("Name"),
            FormulaAst::literal(1),
        );
        assert!(text_operand.validate_shape(&schema).is_err());

        let literal_left = FormulaAst::operator(
            FormulaOp::Add,
            FormulaAst::literal(1),
            FormulaAst::column("Qty"),
        );
        assert!(literal_left.validate_shape(&schema).is_err());

        assert!(FormulaAst::column("Price").validate_shape(&schema).is_err());
    }

    #[test]
    fn test_evaluate() {
        let schema = schema();
        let ast = FormulaAst::operator(
            FormulaOp::Mul,
            FormulaAst::column("Price"),
            FormulaAst::column("Qty"),
        );
        assert_eq!(
            ast.evaluate(&record(json!({"Price": 2.5, "Qty": 4})), &schema),
            Some(10.0)
        );
        assert_eq!(
            ast.evaluate(&record(json!({"Price": "2.5", "Qty": "4"})), &schema),
            Some(10.0)
        );
        assert_eq!(ast.evaluate(&record(json!({"Price": 2.5})), &schema), None);
        assert_eq!(
            ast.evaluate(&record(json!({"Price": "x", "Qty": 1})), &schema),
            None
        );
    }

    #[test]
    fn test_evaluate_rechecks_operand_types() {
        let schema = schema();
        let ast = FormulaAst::operator(
            FormulaOp::Add,
            FormulaAst::column("Name"),
            FormulaAst::literal(1),
        );
        assert_eq!(ast.evaluate(&record(json!({"Name": "5"})), &schema), None);
    }

    #[test]
    fn test_division_by_zero() {
        let ast = FormulaAst::operator(
            FormulaOp::Div,
            FormulaAst::column("Qty"),
            FormulaAst::literal(0),
        );
        assert_eq!(ast.evaluate(&record(json!({"Qty": 3})), &schema()), None);
    }
}
