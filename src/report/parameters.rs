use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::{DataType, ParameterDescriptor};

static PARAMETER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("parameter pattern"));
static OPTIONAL_PARAMETER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@([A-Za-z0-9_]+)\s*=\s*Null\b").expect("optional parameter pattern")
});

const UNIQUE_ID_MARKERS: &[&str] = &["guid", "uuid", "uniqueidentifier", "idempresa", "empresaid"];

type TypeRule = (fn(&str) -> bool, DataType);

/// Evaluated top to bottom; the first matching predicate decides the type.
const TYPE_RULES: &[TypeRule] = &[
    (is_date_name, DataType::DateOnly),
    (is_unique_id_name, DataType::UniqueId),
    (is_integer_name, DataType::Integer),
    (is_decimal_name, DataType::Decimal),
    (is_boolean_name, DataType::Boolean),
];

fn is_date_name(name: &str) -> bool {
    name.contains("fecha")
}

fn is_unique_id_name(name: &str) -> bool {
    UNIQUE_ID_MARKERS.iter().any(|marker| name.contains(marker))
}

fn is_integer_name(name: &str) -> bool {
    name.contains("id") || name.contains("numero") || name.contains("codigo")
}

fn is_decimal_name(name: &str) -> bool {
    name.contains("valor") || name.contains("monto") || name.contains("precio")
}

fn is_boolean_name(name: &str) -> bool {
    name.contains("activo") || name.contains("estado")
}

pub struct ParameterAnalyzer;

impl ParameterAnalyzer {
    /// Discover the `@name` placeholders of a statement, in first-occurrence
    /// order, with their inferred type, label and optionality.
    pub fn analyze(statement: &str) -> Vec<ParameterDescriptor> {
        if statement.trim().is_empty() {
            return Vec::new();
        }

        let optional = Self::optional_names(statement);
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut names: Vec<String> = Vec::new();

        // Repeats keep the first position and take the latest spelling.
        for name in Self::placeholder_names(statement) {
            match positions.get(&name.to_ascii_lowercase()) {
                Some(&index) => names[index] = name,
                None => {
                    positions.insert(name.to_ascii_lowercase(), names.len());
                    names.push(name);
                }
            }
        }

        names
            .into_iter()
            .map(|name| ParameterDescriptor {
                display_name: Self::display_name(&name),
                data_type: Self::infer_type(&name),
                is_required: !optional.contains(&name.to_ascii_lowercase()),
                default_value: None,
                name,
            })
            .collect()
    }

    pub fn placeholder_names(statement: &str) -> Vec<String> {
        PARAMETER_PATTERN
            .captures_iter(statement)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Lowercased names that carry an `= Null` argument default.
    fn optional_names(statement: &str) -> HashSet<String> {
        OPTIONAL_PARAMETER_PATTERN
            .captures_iter(statement)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .collect()
    }

    pub fn infer_type(name: &str) -> DataType {
        let lower = name.to_lowercase();
        TYPE_RULES
            .iter()
            .find(|(matches, _)| matches(&lower))
            .map(|(_, data_type)| *data_type)
            .unwrap_or(DataType::Text)
    }

    pub fn display_name(name: &str) -> String {
        let bare = Self::strip_procedure_prefix(name);

        if name.to_lowercase().contains("fecha") {
            if name.contains("Inicial") {
                return "Fecha Inicial".to_string();
            }
            if name.contains("Final") {
                return "Fecha Final".to_string();
            }
            match bare {
                "FechaActual" => return "Fecha Actual".to_string(),
                "FechaCorte" => return "Fecha de Corte".to_string(),
                _ => {}
            }
        }

        let label = Self::split_words(bare);
        if label.is_empty() {
            name.to_string()
        } else {
            label
        }
    }

    /// `pIdBodega` -> `IdBodega`. A lone or lowercase-followed `p` is kept.
    fn strip_procedure_prefix(name: &str) -> &str {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some('p'), Some(next)) if next.is_ascii_uppercase() || next == '_' => &name[1..],
            _ => name,
        }
    }

    fn split_words(name: &str) -> String {
        let mut label = String::with_capacity(name.len() + 4);
        let mut previous: Option<char> = None;

        for c in name.chars() {
            if c == '_' {
                if !label.ends_with(' ') {
                    label.push(' ');
                }
                previous = Some(' ');
                continue;
            }
            if c.is_uppercase() {
                if let Some(prev) = previous {
                    if !prev.is_uppercase() && prev != ' ' {
                        label.push(' ');
                    }
                }
            }
            label.push(c);
            previous = Some(c);
        }

        label.trim().to_string()
    }
}
