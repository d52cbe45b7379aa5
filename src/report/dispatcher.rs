use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{
    CoercedParameter, ColumnInfo, DataType, ExternalValue, ReportDefinition, ReportError,
    SqlValue, StatementKind, ValueCoercer,
};

static PROCEDURE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s@]+)").expect("procedure name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Text,
    Procedure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    /// Always carries the `@` sigil.
    pub name: String,
    pub data_type: DataType,
    pub value: SqlValue,
}

/// A driver-neutral statement ready for a single round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub text: String,
    pub parameters: Vec<BoundParameter>,
}

/// Columns in driver order and rows as positional cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunnerError {
    /// The backend answered with an explicit empty-response status.
    NoContent,
    Driver(String),
}

/// Executes one command against a database: connect, bind, execute,
/// fetch, release.
pub trait StatementRunner {
    fn run(&self, command: &Command) -> Result<RawResult, RunnerError>;
}

impl<T: StatementRunner + ?Sized> StatementRunner for &T {
    fn run(&self, command: &Command) -> Result<RawResult, RunnerError> {
        (**self).run(command)
    }
}

impl<T: StatementRunner + ?Sized> StatementRunner for Box<T> {
    fn run(&self, command: &Command) -> Result<RawResult, RunnerError> {
        (**self).run(command)
    }
}

pub struct ExecutionDispatcher;

impl ExecutionDispatcher {
    /// Build the command for a report. Ad-hoc statements keep their text
    /// verbatim and bind every placeholder. Procedures are reduced to their
    /// name and bind every key the caller sent, typed by the matching
    /// placeholder when there is one and as text otherwise; unsent optional
    /// arguments keep their declared defaults.
    pub fn build_command(
        report: &ReportDefinition,
        parameters: &[CoercedParameter],
        supplied: &HashMap<String, ExternalValue>,
    ) -> Result<Command, ReportError> {
        match report.kind {
            StatementKind::AdHocQuery => Ok(Command {
                kind: CommandKind::Text,
                text: report.statement.clone(),
                parameters: parameters.iter().map(Self::bind).collect(),
            }),
            StatementKind::StoredProcedure => {
                let name = Self::procedure_name(&report.statement).ok_or_else(|| {
                    ReportError::execution(format!(
                        "Report '{}' does not name a stored procedure",
                        report.id
                    ))
                })?;
                Ok(Command {
                    kind: CommandKind::Procedure,
                    text: name,
                    parameters: Self::procedure_arguments(parameters, supplied),
                })
            }
        }
    }

    fn procedure_arguments(
        parameters: &[CoercedParameter],
        supplied: &HashMap<String, ExternalValue>,
    ) -> Vec<BoundParameter> {
        let mut bound: Vec<BoundParameter> = parameters
            .iter()
            .filter(|p| p.supplied)
            .map(Self::bind)
            .collect();

        let mut extra: Vec<(&str, &ExternalValue)> = supplied
            .iter()
            .map(|(key, value)| (key.trim().trim_start_matches('@'), value))
            .filter(|(key, _)| !parameters.iter().any(|p| p.name.eq_ignore_ascii_case(key)))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));

        for (key, value) in extra {
            if !Self::is_identifier(key) {
                warn!("Skipping procedure argument with invalid name '{}'", key);
                continue;
            }
            let name = Self::with_sigil(key);
            if bound.iter().any(|b| b.name.eq_ignore_ascii_case(&name)) {
                continue;
            }
            bound.push(BoundParameter {
                name,
                data_type: DataType::Text,
                value: Self::null_if_blank(&ValueCoercer::coerce(DataType::Text, value)),
            });
        }

        bound
    }

    fn bind(param: &CoercedParameter) -> BoundParameter {
        BoundParameter {
            name: Self::with_sigil(&param.name),
            data_type: param.data_type,
            value: Self::null_if_blank(&param.value),
        }
    }

    fn is_identifier(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn dispatch<R: StatementRunner>(
        runner: &R,
        command: &Command,
    ) -> Result<RawResult, RunnerError> {
        debug!("Executing {:?} command: {}", command.kind, command.text);
        for param in &command.parameters {
            debug!(
                "  bind {} = {:?} ({})",
                param.name,
                param.value,
                param.data_type.display()
            );
        }
        runner.run(command)
    }

    /// `Sch.SpX @a, @b=Null` -> `Sch.SpX`.
    pub fn procedure_name(statement: &str) -> Option<String> {
        PROCEDURE_NAME_PATTERN
            .captures(statement.trim_start())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
    }

    pub fn with_sigil(name: &str) -> String {
        if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{}", name)
        }
    }

    fn null_if_blank(value: &SqlValue) -> SqlValue {
        match value {
            SqlValue::Text(text) | SqlValue::UniqueId(text) if text.trim().is_empty() => {
                SqlValue::Null
            }
            other => other.clone(),
        }
    }
}
