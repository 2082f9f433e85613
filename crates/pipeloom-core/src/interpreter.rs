//! Transformation interpreter
//!
//! Applies transformation steps directly to JSON rows, used to preview a
//! plan before it is committed.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::schema::{Column, Table};
use crate::transform::{CastType, FilterOperator, NormalizeMode, TransformOp};

/// Apply a sequence of steps to a set of rows.
///
/// Filter steps drop rows; every other step maps each row.
pub fn apply_ops(rows: &[Value], ops: &[TransformOp]) -> Result<Vec<Value>> {
    let mut current: Vec<Value> = rows.to_vec();
    for op in ops {
        let mut next = Vec::with_capacity(current.len());
        for row in &current {
            if let Some(out) = apply_one(row, op)? {
                next.push(out);
            }
        }
        current = next;
    }
    Ok(current)
}

/// Describe the table produced by applying `ops` to `table`
pub fn apply_to_table(table: &Table, ops: &[TransformOp]) -> Table {
    let mut columns: Vec<Column> = table.columns.clone();
    for op in ops {
        match op {
            TransformOp::Rename { column, to } => {
                if let Some(c) = columns.iter_mut().find(|c| &c.name == column) {
                    c.name = to.clone();
                }
            }
            TransformOp::Cast { column, to } => {
                if let Some(c) = columns.iter_mut().find(|c| &c.name == column) {
                    c.data_type = to.column_type().to_string();
                }
            }
            TransformOp::Drop { column } => columns.retain(|c| &c.name != column),
            _ => {}
        }
    }
    Table::new(table.name.clone(), columns)
}

fn as_object<'a>(row: &'a Value, op: &TransformOp) -> Result<&'a Map<String, Value>> {
    row.as_object().ok_or_else(|| Error::TransformError {
        transform: op.name().to_string(),
        message: "row is not a JSON object".to_string(),
    })
}

fn apply_one(row: &Value, op: &TransformOp) -> Result<Option<Value>> {
    let obj = as_object(row, op)?;
    match op {
        TransformOp::Rename { column, to } => {
            let mut out = Map::with_capacity(obj.len());
            for (key, value) in obj {
                if key == column {
                    out.insert(to.clone(), value.clone());
                } else {
                    out.insert(key.clone(), value.clone());
                }
            }
            Ok(Some(Value::Object(out)))
        }
        TransformOp::Cast { column, to } => {
            let mut out = obj.clone();
            if let Some(value) = obj.get(column) {
                out.insert(column.clone(), cast(value, *to, column)?);
            }
            Ok(Some(Value::Object(out)))
        }
        TransformOp::Normalize { column, mode } => {
            let mut out = obj.clone();
            if let Some(Value::String(s)) = obj.get(column) {
                let normalized = match mode {
                    NormalizeMode::Lowercase => s.to_lowercase(),
                    NormalizeMode::Uppercase => s.to_uppercase(),
                    NormalizeMode::Trim => s.trim().to_string(),
                };
                out.insert(column.clone(), Value::String(normalized));
            }
            Ok(Some(Value::Object(out)))
        }
        TransformOp::Filter {
            column,
            operator,
            value,
        } => {
            let actual = obj.get(column).unwrap_or(&Value::Null);
            if matches(actual, *operator, value) {
                Ok(Some(row.clone()))
            } else {
                Ok(None)
            }
        }
        TransformOp::Drop { column } => {
            let mut out = obj.clone();
            out.remove(column);
            Ok(Some(Value::Object(out)))
        }
        TransformOp::FillNull { column, value } => {
            let mut out = obj.clone();
            if obj.get(column).is_none_or(Value::is_null) {
                out.insert(column.clone(), value.clone());
            }
            Ok(Some(Value::Object(out)))
        }
    }
}

fn cast(value: &Value, to: CastType, column: &str) -> Result<Value> {
    let fail = || Error::TransformError {
        transform: "cast".to_string(),
        message: format!("cannot cast {} in '{}' to {}", value, column, to.column_type()),
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    match to {
        CastType::Text => Ok(match value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }),
        CastType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .map(|f| Value::from(f.trunc() as i64))
                .ok_or_else(fail),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| fail()),
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            _ => Err(fail()),
        },
        CastType::Decimal => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            f.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail)
        }
        CastType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(as_text(left).cmp(&as_text(right))),
    }
}

fn matches(actual: &Value, operator: FilterOperator, expected: &Value) -> bool {
    match operator {
        FilterOperator::Contains => as_text(actual).contains(&as_text(expected)),
        FilterOperator::Eq => match (actual, expected) {
            (Value::Null, Value::Null) => true,
            _ => compare(actual, expected) == Some(Ordering::Equal),
        },
        FilterOperator::Ne => match (actual, expected) {
            (Value::Null, Value::Null) => false,
            _ => compare(actual, expected) != Some(Ordering::Equal),
        },
        FilterOperator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FilterOperator::Ge => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::Lt => compare(actual, expected) == Some(Ordering::Less),
        FilterOperator::Le => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}
