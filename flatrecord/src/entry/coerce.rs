use crate::error::{FlatRecordError, Result};
use crate::schema::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_yaml::Value;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// String form of a scalar, used for pattern matching and path rendering.
/// Null has none; collections use their YAML form.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}

fn error(field: &str, message: impl Into<String>) -> FlatRecordError {
    FlatRecordError::Coercion {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Convert `value` to `field_type`. Null passes through untouched; the same
/// conversion is used when reading and writing, so stored values end up in
/// their canonical form.
pub(crate) fn coerce(field: &str, field_type: FieldType, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }
    match field_type {
        FieldType::String => match value {
            Value::String(_) => Ok(value),
            Value::Bool(_) | Value::Number(_) => Ok(Value::String(
                scalar_string(&value).unwrap_or_default(),
            )),
            other => Err(error(field, format!("{other:?} is not a scalar"))),
        },
        FieldType::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::Number(n) => n
                .as_f64()
                .map(|f| Value::from(f.trunc() as i64))
                .ok_or_else(|| error(field, format!("{n} is not an integer"))),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| error(field, format!("'{s}': {e}"))),
            other => Err(error(field, format!("{other:?} is not an integer"))),
        },
        FieldType::Float => match &value {
            Value::Number(n) => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| error(field, format!("{n} is not a float"))),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| error(field, format!("'{s}': {e}"))),
            other => Err(error(field, format!("{other:?} is not a float"))),
        },
        FieldType::Date => {
            let date = parse_date(field, &value)?;
            Ok(Value::String(date.format(DATE_FORMAT).to_string()))
        }
        FieldType::Time => {
            let time = parse_time(field, &value)?;
            Ok(Value::String(time.format(TIME_FORMAT).to_string()))
        }
    }
}

pub(crate) fn parse_date(field: &str, value: &Value) -> Result<NaiveDate> {
    let text = value
        .as_str()
        .ok_or_else(|| error(field, format!("{value:?} is not a date string")))?;
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| error(field, format!("'{text}': {e}")))
}

/// Accepts the stored `YYYY-MM-DD HH:MM:SS UTC` form, RFC 3339 and
/// `YYYY-MM-DD HH:MM:SS +ZZZZ`.
pub(crate) fn parse_time(field: &str, value: &Value) -> Result<DateTime<Utc>> {
    let text = value
        .as_str()
        .ok_or_else(|| error(field, format!("{value:?} is not a time string")))?
        .trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIME_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z")
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| error(field, format!("'{text}': {e}")))
}
