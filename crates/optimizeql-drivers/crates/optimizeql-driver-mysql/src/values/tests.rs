use super::*;
use pretty_assertions::assert_eq;

fn bytes(s: &str) -> mysql_async::Value {
    mysql_async::Value::Bytes(s.as_bytes().to_vec())
}

#[test]
fn test_text_protocol_integers() {
    assert_eq!(mysql_value_to_value(bytes("42"), ColumnType::MYSQL_TYPE_LONG), Value::Int64(42));
    assert_eq!(
        mysql_value_to_value(bytes("18446744073709551615"), ColumnType::MYSQL_TYPE_LONGLONG),
        Value::UInt64(u64::MAX)
    );
}

#[test]
fn test_decimal_keeps_exact_text() {
    assert_eq!(
        mysql_value_to_value(bytes("1234.50"), ColumnType::MYSQL_TYPE_NEWDECIMAL),
        Value::Decimal("1234.50".to_string())
    );
}

#[test]
fn test_binary_protocol_values() {
    assert_eq!(mysql_value_to_value(mysql_async::Value::NULL, ColumnType::MYSQL_TYPE_LONG), Value::Null);
    assert_eq!(
        mysql_value_to_value(mysql_async::Value::UInt(7), ColumnType::MYSQL_TYPE_LONGLONG),
        Value::Int64(7)
    );
    assert_eq!(
        mysql_value_to_value(mysql_async::Value::Double(0.5), ColumnType::MYSQL_TYPE_DOUBLE),
        Value::Float64(0.5)
    );
}

#[test]
fn test_dates() {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    assert_eq!(
        mysql_value_to_value(bytes("2024-03-09"), ColumnType::MYSQL_TYPE_DATE),
        Value::Date(date)
    );
    assert_eq!(
        mysql_value_to_value(
            mysql_async::Value::Date(2024, 3, 9, 13, 5, 0, 0),
            ColumnType::MYSQL_TYPE_DATETIME
        ),
        Value::DateTime(date.and_hms_opt(13, 5, 0).unwrap())
    );
    // prepared statements send midnight DATETIMEs without a time part
    assert_eq!(
        mysql_value_to_value(
            mysql_async::Value::Date(2024, 3, 9, 0, 0, 0, 0),
            ColumnType::MYSQL_TYPE_DATETIME
        ),
        Value::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
    );
    assert_eq!(
        mysql_value_to_value(mysql_async::Value::Date(0, 0, 0, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE),
        Value::String("0000-00-00".to_string())
    );
}

#[test]
fn test_negative_time_spanning_days() {
    assert_eq!(
        mysql_value_to_value(
            mysql_async::Value::Time(true, 1, 2, 3, 4, 0),
            ColumnType::MYSQL_TYPE_TIME
        ),
        Value::String("-26:03:04.000000".to_string())
    );
}

#[test]
fn test_invalid_utf8_stays_bytes() {
    assert_eq!(
        mysql_value_to_value(mysql_async::Value::Bytes(vec![0xff, 0xfe]), ColumnType::MYSQL_TYPE_BLOB),
        Value::Bytes(vec![0xff, 0xfe])
    );
}
