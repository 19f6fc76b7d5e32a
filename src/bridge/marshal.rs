//! Argument and position marshaling
//!
//! Host integers, strings and points converted to native values and back.
//! Points are `(ROW . COLUMN)` with 1-based rows and 0-based columns; byte
//! offsets handed to the host are 1-based.

use crate::host::Value;
use crate::{Error, Result};
use tree_sitter::Point;

fn wrong_type(predicate: &'static str, value: &Value) -> Error {
    Error::WrongType {
        predicate,
        value: value.clone(),
    }
}

/// Extract an integer
pub fn integer(value: &Value) -> Result<i64> {
    value.as_int().ok_or_else(|| wrong_type("integerp", value))
}

/// Extract a 0-based index below `limit`
pub fn index(value: &Value, limit: usize) -> Result<usize> {
    let n = integer(value)?;
    usize::try_from(n)
        .ok()
        .filter(|n| *n < limit)
        .ok_or_else(|| Error::ArgsOutOfRange(format!("{} not in [0, {})", n, limit)))
}

/// Extract a 1-based host position and convert it to a 0-based offset
pub fn position(value: &Value) -> Result<usize> {
    let n = integer(value)?;
    if n < 1 {
        return Err(Error::ArgsOutOfRange(format!("position {} is before the start", n)));
    }
    usize::try_from(n - 1).map_err(|_| Error::ArgsOutOfRange(n.to_string()))
}

/// Convert a 0-based offset to a 1-based host position
pub fn make_position(offset: usize) -> Value {
    Value::count(offset.saturating_add(1))
}

/// Extract a string
pub fn string(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| wrong_type("stringp", value))
}

/// Extract a `(ROW . COLUMN)` point
pub fn point(value: &Value) -> Result<Point> {
    let invalid = || wrong_type("tree-sitter-point-p", value);
    let (row, column) = value.as_cons().ok_or_else(invalid)?;
    let row = row.as_int().ok_or_else(invalid)?;
    let column = column.as_int().ok_or_else(invalid)?;
    if row < 1 || column < 0 {
        return Err(invalid());
    }
    let row = usize::try_from(row - 1).map_err(|_| invalid())?;
    let column = usize::try_from(column).map_err(|_| invalid())?;
    Ok(Point::new(row, column))
}

/// Build a `(ROW . COLUMN)` point
pub fn make_point(point: Point) -> Value {
    Value::cons(Value::count(point.row.saturating_add(1)), Value::count(point.column))
}
