use once_cell::sync::Lazy;
use regex::RegexSet;

use super::{
    ColumnMetadata, ParameterDescriptor, RawResult, ResultEnvelope, ResultRow, RunnerError,
    SqlValue,
};

/// Driver messages that mean "the statement ran but found nothing".
const NO_DATA_PATTERNS: &[&str] = &[
    "no existe información",
    "no existe informacion",
    "sin datos",
    "no data",
    "no records",
    "ningún registro",
    "ningun registro",
    "no se encontraron datos",
    "0 registros",
    "0 rows",
    "ora-01403",
];

static NUMERIC_COLUMN_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)subtotal",
        r"(?i)descuento",
        r"(?i)valor.*iva",
        r"(?i)retencion.*iva",
        r"(?i)total.*documento",
        r"(?i)precio",
        r"(?i)importe",
        r"(?i)monto",
        r"(?i)cantidad",
        r"(?i)^valor$",
        r"(?i)^total$",
        r"(?i)^neto$",
        r"(?i)^bruto$",
        r"(?i)base.*gravable",
        r"(?i)impuesto",
        r"(?i)^iva$",
        r"(?i)^ice$",
        r"(?i)^irbpnr$",
    ])
    .expect("numeric column patterns")
});

const NUMERIC_SAMPLE_ROWS: usize = 10;
const NUMERIC_SAMPLE_RATIO: f64 = 0.7;

/// What a failed round trip turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Empty,
    Failure(String),
}

pub struct ResultShaper;

impl ResultShaper {
    pub fn shape(raw: RawResult, parameters: Vec<ParameterDescriptor>) -> ResultEnvelope {
        let RawResult { columns, rows } = raw;

        let data: Vec<ResultRow> = rows
            .into_iter()
            .map(|cells| {
                let mut row = ResultRow::new();
                for (column, value) in columns.iter().zip(cells) {
                    row.insert(column.name.clone(), value);
                }
                row
            })
            .collect();

        let column_data_types = columns
            .iter()
            .map(|column| {
                let samples: Vec<&SqlValue> = data
                    .iter()
                    .take(NUMERIC_SAMPLE_ROWS)
                    .filter_map(|row| row.get(&column.name))
                    .collect();
                ColumnMetadata {
                    name: column.name.clone(),
                    data_type: column.data_type.clone(),
                    numeric: Self::should_format_as_numeric(&column.name, &samples),
                }
            })
            .collect();

        let total_records = data.len();
        ResultEnvelope {
            columns: columns.into_iter().map(|column| column.name).collect(),
            column_data_types,
            data,
            parameters,
            total_records,
        }
    }

    pub fn empty(parameters: Vec<ParameterDescriptor>) -> ResultEnvelope {
        Self::shape(RawResult::default(), parameters)
    }

    pub fn classify(error: &RunnerError) -> Outcome {
        match error {
            RunnerError::NoContent => Outcome::Empty,
            RunnerError::Driver(message) if Self::is_no_data_message(message) => Outcome::Empty,
            RunnerError::Driver(message) => Outcome::Failure(message.clone()),
        }
    }

    pub fn is_no_data_message(message: &str) -> bool {
        let lower = message.to_lowercase();
        NO_DATA_PATTERNS.iter().any(|pattern| lower.contains(pattern))
    }

    pub fn is_numeric_column(name: &str) -> bool {
        NUMERIC_COLUMN_PATTERNS.is_match(name)
    }

    pub fn is_numeric_value(value: &SqlValue) -> bool {
        match value {
            SqlValue::Integer(_) => true,
            SqlValue::Number(number) => number.is_finite(),
            SqlValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .map(|number| number.is_finite())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Name patterns first, then the share of numeric values among the
    /// non-blank samples.
    pub fn should_format_as_numeric(name: &str, samples: &[&SqlValue]) -> bool {
        if Self::is_numeric_column(name) {
            return true;
        }

        let present: Vec<&&SqlValue> = samples.iter().filter(|v| !Self::is_blank(v)).collect();
        if present.is_empty() {
            return false;
        }
        let numeric = present.iter().filter(|v| Self::is_numeric_value(v)).count();
        numeric as f64 / present.len() as f64 > NUMERIC_SAMPLE_RATIO
    }

    fn is_blank(value: &SqlValue) -> bool {
        match value {
            SqlValue::Null => true,
            SqlValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}
