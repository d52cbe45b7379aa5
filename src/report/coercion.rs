use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::{DataType, ExternalValue, ParameterDescriptor, ReportError, SqlValue};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A parameter value after coercion, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedParameter {
    pub name: String,
    pub data_type: DataType,
    pub value: SqlValue,
    /// Whether the caller sent a key for this parameter at all.
    pub supplied: bool,
}

pub struct ValueCoercer;

impl ValueCoercer {
    /// Inbound coercion of a single value. Never fails: malformed input
    /// becomes `SqlValue::Null`.
    pub fn coerce(data_type: DataType, value: &ExternalValue) -> SqlValue {
        if value.is_blank() {
            return SqlValue::Null;
        }

        match data_type {
            DataType::DateOnly => Self::to_date(value)
                .map(SqlValue::Date)
                .unwrap_or(SqlValue::Null),
            DataType::Integer | DataType::Decimal => Self::to_number(value),
            DataType::UniqueId => match value {
                ExternalValue::Text(text) => SqlValue::UniqueId(text.trim().to_string()),
                other => Self::passthrough(other),
            },
            DataType::Boolean | DataType::Text => Self::passthrough(value),
        }
    }

    /// Coerce the supplied values for every descriptor and enforce required
    /// parameters. All missing names are reported together.
    pub fn coerce_all(
        descriptors: &[ParameterDescriptor],
        supplied: &HashMap<String, ExternalValue>,
    ) -> Result<Vec<CoercedParameter>, ReportError> {
        let mut coerced = Vec::with_capacity(descriptors.len());
        let mut missing = Vec::new();

        for descriptor in descriptors {
            let raw = Self::lookup(supplied, &descriptor.name);
            let value = raw
                .map(|value| Self::coerce(descriptor.data_type, value))
                .unwrap_or(SqlValue::Null);

            if value.is_null() && descriptor.is_required {
                missing.push(descriptor.name.clone());
                continue;
            }

            coerced.push(CoercedParameter {
                name: descriptor.name.clone(),
                data_type: descriptor.data_type,
                value,
                supplied: raw.is_some(),
            });
        }

        if missing.is_empty() {
            Ok(coerced)
        } else {
            Err(ReportError::MissingParameters { names: missing })
        }
    }

    /// Outbound coercion of a previously supplied value into a form default.
    /// Dates come back in the compact `YYYYMMDD` wire form. Blank input
    /// yields `None`.
    pub fn initial_value(data_type: DataType, value: &ExternalValue) -> Option<SqlValue> {
        if value.is_blank() {
            return None;
        }
        if data_type == DataType::DateOnly {
            return Self::to_date(value)
                .map(|date| SqlValue::Text(Self::format_compact_date(&date)));
        }
        Some(Self::passthrough(value))
    }

    /// Compact wire form of a date: `YYYYMMDD`.
    pub fn format_compact_date(date: &NaiveDate) -> String {
        date.format("%Y%m%d").to_string()
    }

    /// Find a supplied value by exact name, then with or without the `@`
    /// sigil, then ignoring ASCII case (smallest matching key wins).
    pub fn lookup<'a>(
        supplied: &'a HashMap<String, ExternalValue>,
        name: &str,
    ) -> Option<&'a ExternalValue> {
        let bare = name.trim_start_matches('@');
        supplied
            .get(name)
            .or_else(|| supplied.get(&format!("@{}", bare)))
            .or_else(|| supplied.get(bare))
            .or_else(|| {
                supplied
                    .iter()
                    .filter(|(key, _)| key.trim_start_matches('@').eq_ignore_ascii_case(bare))
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, value)| value)
            })
    }

    pub fn to_date(value: &ExternalValue) -> Option<NaiveDate> {
        match value {
            ExternalValue::Date(date) => Some(*date),
            ExternalValue::Text(text) => Self::parse_date(text.trim()),
            ExternalValue::Integer(number) => Self::parse_date(&number.to_string()),
            _ => None,
        }
    }

    fn parse_date(text: &str) -> Option<NaiveDate> {
        if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
            let year: i32 = text[0..4].parse().ok()?;
            let month: u32 = text[4..6].parse().ok()?;
            let day: u32 = text[6..8].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }

        if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
            return Some(stamp.date_naive());
        }
        for format in DATE_TIME_FORMATS {
            if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
                return Some(stamp.date());
            }
        }
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
    }

    fn to_number(value: &ExternalValue) -> SqlValue {
        match value {
            ExternalValue::Integer(number) => SqlValue::Integer(*number),
            ExternalValue::Float(number) if number.is_finite() => SqlValue::Number(*number),
            ExternalValue::Text(text) => {
                let text = text.trim();
                if let Ok(number) = text.parse::<i64>() {
                    SqlValue::Integer(number)
                } else {
                    match text.parse::<f64>() {
                        Ok(number) if number.is_finite() => SqlValue::Number(number),
                        _ => SqlValue::Null,
                    }
                }
            }
            _ => SqlValue::Null,
        }
    }

    fn passthrough(value: &ExternalValue) -> SqlValue {
        match value {
            ExternalValue::Null => SqlValue::Null,
            ExternalValue::Text(text) => SqlValue::Text(text.trim().to_string()),
            ExternalValue::Integer(number) => SqlValue::Integer(*number),
            ExternalValue::Float(number) => SqlValue::Number(*number),
            ExternalValue::Boolean(flag) => SqlValue::Boolean(*flag),
            ExternalValue::Date(date) => SqlValue::Date(*date),
        }
    }
}
