//! Decoding MySQL cells into optimizeql values

use mysql_async::Row as MySqlRow;
use mysql_async::consts::ColumnType;
use optimizeql_core::Value;

/// Convert one MySQL cell into a `Value`.
///
/// The text protocol hands every non-null cell over as bytes, so the
/// column type decides how they are parsed. The binary protocol used for
/// prepared statements sends typed values, which are mapped directly.
pub(crate) fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => text_to_value(s, col_type),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            let is_date_column = matches!(col_type, ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE);
            match date {
                Some(date) if is_date_column => Value::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .map(Value::DateTime)
                    .unwrap_or_else(|| {
                        Value::String(format!(
                            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, min, sec
                        ))
                    }),
                // zero dates such as 0000-00-00 have no chrono representation
                None => Value::String(format!("{:04}-{:02}-{:02}", year, month, day)),
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn text_to_value(s: String, col_type: ColumnType) -> Value {
    match col_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => match s.parse::<i64>() {
            Ok(i) => Value::Int64(i),
            Err(_) => s.parse::<u64>().map(Value::UInt64).unwrap_or(Value::String(s)),
        },
        ColumnType::MYSQL_TYPE_FLOAT => s.parse::<f32>().map(Value::Float32).unwrap_or(Value::String(s)),
        ColumnType::MYSQL_TYPE_DOUBLE => s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s)),
        // keep exact decimal text instead of rounding through f64
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => Value::Decimal(s),
        ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&s).map(Value::Json).unwrap_or(Value::String(s)),
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::String(s)),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                .map(Value::DateTime)
                .unwrap_or(Value::String(s))
        }
        _ => Value::String(s),
    }
}

/// Convert every cell of `row` into a `Value`
pub(crate) fn row_to_values(row: &MySqlRow) -> Vec<Value> {
    (0..row.len()).map(|idx| row_cell(row, idx)).collect()
}

/// Column `idx` of `row` as text, `None` for NULL or a missing column
pub(crate) fn cell_text(row: &MySqlRow, idx: usize) -> Option<String> {
    match row_cell(row, idx) {
        Value::Null => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        other => Some(other.to_string()),
    }
}

/// Column `idx` of `row` as an integer, `None` when it is not numeric
pub(crate) fn cell_i64(row: &MySqlRow, idx: usize) -> Option<i64> {
    row_cell(row, idx).as_i64()
}

pub(crate) fn row_cell(row: &MySqlRow, idx: usize) -> Value {
    let col_type = row
        .columns_ref()
        .get(idx)
        .map(|c| c.column_type())
        .unwrap_or(ColumnType::MYSQL_TYPE_VAR_STRING);
    let raw = row.as_ref(idx).cloned().unwrap_or(mysql_async::Value::NULL);
    mysql_value_to_value(raw, col_type)
}

#[cfg(test)]
mod tests;
