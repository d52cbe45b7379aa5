use chrono::NaiveDateTime;
use log::debug;
use std::collections::HashSet;
use oracle::sql_type::OracleType;
use oracle::{Connection, Error as OracleError, ResultSet, Row, Statement};

use crate::db::connection::{open_connection, ConnectionInfo};
use crate::report::{
    BoundParameter, ColumnInfo, Command, CommandKind, DataType, RawResult, RunnerError,
    SqlValue, StatementRunner,
};

/// Runs report commands against Oracle, one connection per command.
pub struct OracleRunner {
    info: ConnectionInfo,
}

impl OracleRunner {
    pub fn new(info: ConnectionInfo) -> Self {
        Self { info }
    }

    /// `Ok(None)` when the statement ran but produced no result set.
    fn run_text(conn: &Connection, command: &Command) -> Result<Option<RawResult>, OracleError> {
        let (sql, bind_names) =
            Self::to_oracle_binds(command.text.trim().trim_end_matches(';').trim_end());
        debug!("Oracle statement: {sql}");

        let parameters = Self::binds_in_use(&command.parameters, &bind_names);
        let mut stmt = conn.statement(&sql).build()?;
        Self::bind_parameters(&mut stmt, &parameters)?;

        if stmt.is_query() {
            let result_set = stmt.query(&[])?;
            return Self::collect(result_set).map(Some);
        }

        stmt.execute(&[])?;
        Self::first_implicit_result(&stmt)
    }

    fn run_procedure(conn: &Connection, command: &Command) -> Result<Option<RawResult>, OracleError> {
        let block = Self::procedure_block(&command.text, &command.parameters);
        debug!("Oracle procedure block: {block}");

        let parameters: Vec<&BoundParameter> = command.parameters.iter().collect();
        let mut stmt = conn.statement(&block).build()?;
        Self::bind_parameters(&mut stmt, &parameters)?;
        stmt.execute(&[])?;
        Self::first_implicit_result(&stmt)
    }

    fn first_implicit_result(stmt: &Statement) -> Result<Option<RawResult>, OracleError> {
        match stmt.implicit_result()? {
            Some(mut cursor) => {
                let result_set = cursor.query()?;
                Self::collect(result_set).map(Some)
            }
            None => Ok(None),
        }
    }

    fn collect(result_set: ResultSet<'_, Row>) -> Result<RawResult, OracleError> {
        let types: Vec<OracleType> = result_set
            .column_info()
            .iter()
            .map(|col| col.oracle_type().clone())
            .collect();
        let columns: Vec<ColumnInfo> = result_set
            .column_info()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.oracle_type().to_string(),
            })
            .collect();

        let mut rows = Vec::new();
        for row_result in result_set {
            let row = row_result?;
            let mut cells = Vec::with_capacity(types.len());
            for (index, oracle_type) in types.iter().enumerate() {
                cells.push(Self::read_cell(&row, index, oracle_type)?);
            }
            rows.push(cells);
        }

        Ok(RawResult { columns, rows })
    }

    fn read_cell(row: &Row, index: usize, oracle_type: &OracleType) -> Result<SqlValue, OracleError> {
        let value = match oracle_type {
            OracleType::Number(_, _) | OracleType::Float(_) => row
                .get::<usize, Option<String>>(index)?
                .map(|text| Self::parse_number(&text)),
            OracleType::BinaryFloat | OracleType::BinaryDouble => row
                .get::<usize, Option<f64>>(index)?
                .map(SqlValue::Number),
            OracleType::Date
            | OracleType::Timestamp(_)
            | OracleType::TimestampTZ(_)
            | OracleType::TimestampLTZ(_) => row
                .get::<usize, Option<NaiveDateTime>>(index)?
                .map(SqlValue::DateTime),
            _ => row
                .get::<usize, Option<String>>(index)?
                .map(SqlValue::Text),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }

    /// Oracle hands NUMBER values over as exact text; keep integers integral.
    fn parse_number(text: &str) -> SqlValue {
        let trimmed = text.trim();
        if let Ok(int) = trimmed.parse::<i64>() {
            return SqlValue::Integer(int);
        }
        match trimmed.parse::<f64>() {
            Ok(number) => SqlValue::Number(number),
            Err(_) => SqlValue::Text(text.to_string()),
        }
    }

    /// Placeholders that only appear inside literals or comments have no
    /// bind slot in the rewritten SQL and must not be bound.
    pub(crate) fn binds_in_use<'a>(
        parameters: &'a [BoundParameter],
        bind_names: &[String],
    ) -> Vec<&'a BoundParameter> {
        parameters
            .iter()
            .filter(|param| {
                let name = Self::bind_name(&param.name).to_ascii_uppercase();
                bind_names.contains(&name)
            })
            .collect()
    }

    fn bind_parameters(stmt: &mut Statement, parameters: &[&BoundParameter]) -> Result<(), OracleError> {
        for param in parameters {
            let name = Self::bind_name(&param.name);
            match &param.value {
                SqlValue::Null => stmt.bind(name, &Self::null_type(param.data_type))?,
                SqlValue::Text(text) | SqlValue::UniqueId(text) => stmt.bind(name, text)?,
                SqlValue::Integer(number) => stmt.bind(name, number)?,
                SqlValue::Number(number) => stmt.bind(name, number)?,
                SqlValue::Boolean(flag) => stmt.bind(name, &i32::from(*flag))?,
                SqlValue::Date(date) => stmt.bind(name, date)?,
                SqlValue::DateTime(stamp) => stmt.bind(name, stamp)?,
            }
        }
        Ok(())
    }

    fn null_type(data_type: DataType) -> OracleType {
        match data_type {
            DataType::Integer | DataType::Decimal | DataType::Boolean => OracleType::Number(0, 0),
            DataType::DateOnly => OracleType::Date,
            DataType::UniqueId => OracleType::Varchar2(36),
            DataType::Text => OracleType::Varchar2(4000),
        }
    }

    fn bind_name(name: &str) -> &str {
        name.trim_start_matches('@')
    }

    /// `BEGIN Sch.SpX(a => :a, b => :b); END;`
    pub(crate) fn procedure_block(procedure: &str, parameters: &[BoundParameter]) -> String {
        if parameters.is_empty() {
            return format!("BEGIN {}; END;", procedure);
        }
        let args: Vec<String> = parameters
            .iter()
            .map(|param| {
                let name = Self::bind_name(&param.name);
                format!("{name} => :{name}")
            })
            .collect();
        format!("BEGIN {}({}); END;", procedure, args.join(", "))
    }

    /// Rewrite `@name` placeholders to Oracle `:name` binds, leaving string
    /// literals, quoted identifiers and comments untouched. Also returns the
    /// distinct bind names emitted, uppercased.
    pub(crate) fn to_oracle_binds(sql: &str) -> (String, Vec<String>) {
        let chars: Vec<char> = sql.chars().collect();
        let len = chars.len();
        let mut out = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut in_line_comment = false;
        let mut in_block_comment = false;
        let mut i = 0usize;

        while i < len {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if in_line_comment {
                if c == '\n' {
                    in_line_comment = false;
                }
                out.push(c);
                i += 1;
                continue;
            }

            if in_block_comment {
                if c == '*' && next == Some('/') {
                    in_block_comment = false;
                    out.push_str("*/");
                    i += 2;
                    continue;
                }
                out.push(c);
                i += 1;
                continue;
            }

            if in_single_quote {
                if c == '\'' {
                    if next == Some('\'') {
                        out.push_str("''");
                        i += 2;
                        continue;
                    }
                    in_single_quote = false;
                }
                out.push(c);
                i += 1;
                continue;
            }

            if in_double_quote {
                if c == '"' {
                    in_double_quote = false;
                }
                out.push(c);
                i += 1;
                continue;
            }

            match c {
                '\'' => in_single_quote = true,
                '"' => in_double_quote = true,
                '-' if next == Some('-') => in_line_comment = true,
                '/' if next == Some('*') => {
                    in_block_comment = true;
                    out.push_str("/*");
                    i += 2;
                    continue;
                }
                '@' if next.map_or(false, |n| n.is_ascii_alphanumeric() || n == '_') => {
                    out.push(':');
                    i += 1;
                    let start = i;
                    while i < len && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        out.push(chars[i]);
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect::<String>().to_ascii_uppercase();
                    if seen.insert(name.clone()) {
                        names.push(name);
                    }
                    continue;
                }
                _ => {}
            }

            out.push(c);
            i += 1;
        }

        (out, names)
    }
}

impl StatementRunner for OracleRunner {
    fn run(&self, command: &Command) -> Result<RawResult, RunnerError> {
        let conn = open_connection(&self.info).map_err(driver_error)?;
        let result = match command.kind {
            CommandKind::Text => Self::run_text(&conn, command),
            CommandKind::Procedure => Self::run_procedure(&conn, command),
        };
        drop(conn);
        result.map_err(driver_error)?.ok_or(RunnerError::NoContent)
    }
}

fn driver_error(err: OracleError) -> RunnerError {
    RunnerError::Driver(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> BoundParameter {
        BoundParameter {
            name: name.to_string(),
            data_type: DataType::Text,
            value: SqlValue::Null,
        }
    }

    #[test]
    fn placeholders_become_oracle_binds() {
        let (sql, names) =
            OracleRunner::to_oracle_binds("SELECT * FROM v WHERE a = @pA AND b=@pB OR c = @pa");
        assert_eq!(sql, "SELECT * FROM v WHERE a = :pA AND b=:pB OR c = :pa");
        assert_eq!(names, vec!["PA", "PB"]);
    }

    #[test]
    fn literals_and_comments_are_untouched() {
        let sql = "SELECT 'mail@host', \"x@y\" FROM t -- @c\nWHERE a = @a /* @b */ AND s = 'it''s @d'";
        let (rewritten, names) = OracleRunner::to_oracle_binds(sql);
        assert_eq!(
            rewritten,
            "SELECT 'mail@host', \"x@y\" FROM t -- @c\nWHERE a = :a /* @b */ AND s = 'it''s @d'"
        );
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn lone_sigil_is_kept() {
        let (sql, names) = OracleRunner::to_oracle_binds("SELECT @ FROM t");
        assert_eq!(sql, "SELECT @ FROM t");
        assert!(names.is_empty());
    }

    #[test]
    fn placeholders_inside_literals_are_not_bound() {
        let (_, names) = OracleRunner::to_oracle_binds(
            "SELECT * FROM c WHERE mail LIKE '%@empresa.com' AND id = @pIdCliente",
        );
        let parameters = vec![param("@empresa"), param("@pIdCliente")];
        let in_use = OracleRunner::binds_in_use(&parameters, &names);
        let bound: Vec<&str> = in_use.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(bound, vec!["@pIdCliente"]);
    }

    #[test]
    fn procedure_block_uses_named_notation() {
        assert_eq!(
            OracleRunner::procedure_block("Sch.SpX", &[param("@a"), param("@pIdBodega")]),
            "BEGIN Sch.SpX(a => :a, pIdBodega => :pIdBodega); END;"
        );
        assert_eq!(OracleRunner::procedure_block("Sch.SpX", &[]), "BEGIN Sch.SpX; END;");
    }

    #[test]
    fn oracle_numbers_stay_exact() {
        assert_eq!(OracleRunner::parse_number("42"), SqlValue::Integer(42));
        assert_eq!(OracleRunner::parse_number("-0.25"), SqlValue::Number(-0.25));
    }
}
