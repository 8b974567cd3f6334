//! Decoding PostgreSQL rows into optimizeql values

use optimizeql_core::Value;
use postgres_types::{FromSql, Type};
use std::fmt::Write as _;
use tokio_postgres::Row as PgRow;

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

/// `NUMERIC` decoded to its exact decimal text
#[derive(Debug)]
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any other type: UTF-8 text when the payload is text-like, raw bytes otherwise
#[derive(Debug)]
struct PgRaw(Value);

impl<'a> FromSql<'a> for PgRaw {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        Ok(Self(match std::str::from_utf8(raw) {
            Ok(text) if !text.contains('\0') => Value::String(text.to_string()),
            _ => Value::Bytes(raw.to_vec()),
        }))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decode the binary `NUMERIC` wire format: a header of four 16-bit words
/// (digit count, weight, sign, display scale) followed by base-10000 digits.
pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() < 8 {
        return Err("NUMERIC payload shorter than its header".into());
    }
    let word = |offset: usize| u16::from_be_bytes([raw[offset], raw[offset + 1]]);

    let ndigits = word(0) as usize;
    let weight = word(2) as i16 as i32;
    let sign = word(4);
    let dscale = word(6) as usize;

    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }
    if raw.len() < 8 + ndigits * 2 {
        return Err("NUMERIC payload truncated".into());
    }

    let digit = |position: i32| -> u16 {
        if position < 0 || position as usize >= ndigits {
            0
        } else {
            word(8 + position as usize * 2)
        }
    };

    let mut text = String::new();
    if sign == 0x4000 {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        for position in 0..=weight {
            if position == 0 {
                let _ = write!(text, "{}", digit(position));
            } else {
                let _ = write!(text, "{:04}", digit(position));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut position = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit(position));
            position += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(column = idx, error = %e, "failed to decode PostgreSQL value");
            None
        }
    }
}

/// Convert column `idx` of `row` into a `Value`
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "bool" => get::<bool>(row, idx).map(Value::Bool),
        "int2" => get::<i16>(row, idx).map(Value::Int16),
        "int4" => get::<i32>(row, idx).map(Value::Int32),
        "int8" => get::<i64>(row, idx).map(Value::Int64),
        "oid" => get::<u32>(row, idx).map(|v| Value::Int64(v as i64)),
        "float4" => get::<f32>(row, idx).map(Value::Float32),
        "float8" => get::<f64>(row, idx).map(Value::Float64),
        "numeric" => get::<PgNumeric>(row, idx).map(|v| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" | "citext" => get::<String>(row, idx).map(Value::String),
        "bytea" => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx).map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx).map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx).map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx).map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(Value::DateTimeUtc),
        "_text" | "_varchar" | "_bpchar" | "_name" => get::<Vec<String>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(Value::String).collect())),
        "_int2" => get::<Vec<i16>>(row, idx).map(|arr| Value::Array(arr.into_iter().map(Value::Int16).collect())),
        "_int4" => get::<Vec<i32>>(row, idx).map(|arr| Value::Array(arr.into_iter().map(Value::Int32).collect())),
        "_int8" => get::<Vec<i64>>(row, idx).map(|arr| Value::Array(arr.into_iter().map(Value::Int64).collect())),
        "_float4" => {
            get::<Vec<f32>>(row, idx).map(|arr| Value::Array(arr.into_iter().map(Value::Float32).collect()))
        }
        "_float8" => {
            get::<Vec<f64>>(row, idx).map(|arr| Value::Array(arr.into_iter().map(Value::Float64).collect()))
        }
        _ => get::<PgRaw>(row, idx).map(|v| v.0),
    };

    value.unwrap_or(Value::Null)
}

/// Split the text form of an array (`{a,"b c",NULL}`) into its elements
pub(crate) fn parse_array_text(text: &str) -> Vec<String> {
    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    if inner.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' if !quoted => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}
