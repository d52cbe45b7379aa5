use super::*;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

struct FakeCatalog {
    reports: HashMap<String, ReportDefinition>,
}

impl FakeCatalog {
    fn with(reports: Vec<ReportDefinition>) -> Self {
        Self {
            reports: reports.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }
}

impl ReportCatalog for FakeCatalog {
    fn find_report(&self, id: &str) -> Option<ReportDefinition> {
        self.reports.get(id).cloned()
    }
}

/// Replays one canned response and records every command it receives.
struct FakeRunner {
    response: Result<RawResult, RunnerError>,
    commands: Mutex<Vec<Command>>,
}

impl FakeRunner {
    fn returning(response: Result<RawResult, RunnerError>) -> Self {
        Self {
            response,
            commands: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

impl StatementRunner for FakeRunner {
    fn run(&self, command: &Command) -> Result<RawResult, RunnerError> {
        self.commands.lock().unwrap().push(command.clone());
        self.response.clone()
    }
}

fn definition(id: &str, kind: StatementKind, statement: &str) -> ReportDefinition {
    ReportDefinition {
        id: id.to_string(),
        name: id.to_string(),
        title: format!("Report {id}"),
        statement: statement.to_string(),
        kind,
    }
}

fn catalog() -> FakeCatalog {
    FakeCatalog::with(vec![
        definition(
            "ventas",
            StatementKind::AdHocQuery,
            "SELECT * FROM vw_Ventas WHERE Fecha BETWEEN @pFechaInicial AND @pFechaFinal AND IdVendedor = NVL(@pIdVendedor, IdVendedor) /* @pIdVendedor = Null */",
        ),
        definition(
            "saldo",
            StatementKind::StoredProcedure,
            "Empresa.spReporte_ResumenSaldoInventario @pIdEmpresa, @pFechaCorte, @pIdBodega = Null",
        ),
    ])
}

fn stock_result() -> RawResult {
    RawResult {
        columns: vec![
            ColumnInfo {
                name: "Producto".to_string(),
                data_type: "VARCHAR2(100)".to_string(),
            },
            ColumnInfo {
                name: "Cantidad".to_string(),
                data_type: "NUMBER(12)".to_string(),
            },
        ],
        rows: vec![
            vec![SqlValue::Text("Arroz".to_string()), SqlValue::Integer(40)],
            vec![SqlValue::Text("Azucar".to_string()), SqlValue::Integer(12)],
        ],
    }
}

fn text(value: &str) -> ExternalValue {
    ExternalValue::Text(value.to_string())
}

#[test]
fn parameters_for_known_report() {
    let runner = FakeRunner::returning(Ok(RawResult::default()));
    let engine = ReportEngine::new(catalog(), &runner);

    let params = engine.parameters("saldo").unwrap();
    let summary: Vec<(&str, DataType, bool)> = params
        .iter()
        .map(|p| (p.name.as_str(), p.data_type, p.is_required))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("pIdEmpresa", DataType::UniqueId, true),
            ("pFechaCorte", DataType::DateOnly, true),
            ("pIdBodega", DataType::Integer, false),
        ]
    );
    assert_eq!(params[1].display_name, "Fecha de Corte");
    assert!(runner.commands().is_empty());
}

#[test]
fn unknown_report_is_not_executed() {
    let runner = FakeRunner::returning(Ok(RawResult::default()));
    let engine = ReportEngine::new(catalog(), &runner);

    let err = engine.execute(&ExecutionRequest::new("missing")).unwrap_err();
    assert_eq!(
        err,
        ReportError::UnknownReport {
            id: "missing".to_string()
        }
    );
    assert!(err.is_client_error());
    assert!(runner.commands().is_empty());
    assert!(engine.parameters("missing").is_err());
}

#[test]
fn missing_required_parameter_never_reaches_the_database() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("saldo")
        .with_parameter("@pIdEmpresa", text("6F9619FF-8B86-D011-B42D-00C04FC964FF"))
        .with_parameter("@pFechaCorte", text(""));
    let err = engine.execute(&request).unwrap_err();
    assert_eq!(
        err,
        ReportError::MissingParameters {
            names: vec!["pFechaCorte".to_string()]
        }
    );
    assert!(runner.commands().is_empty());
}

#[test]
fn stored_procedure_dispatch() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("saldo")
        .with_parameter("@pIdEmpresa", text(" 6F9619FF-8B86-D011-B42D-00C04FC964FF "))
        .with_parameter("pFechaCorte", text("20240630"))
        .with_parameter("@pIdBodega", text(""));
    let envelope = engine.execute(&request).unwrap();

    let commands = runner.commands();
    assert_eq!(commands.len(), 1);
    let command = &commands[0];
    assert_eq!(command.kind, CommandKind::Procedure);
    assert_eq!(command.text, "Empresa.spReporte_ResumenSaldoInventario");
    assert_eq!(
        command.parameters,
        vec![
            BoundParameter {
                name: "@pIdEmpresa".to_string(),
                data_type: DataType::UniqueId,
                value: SqlValue::UniqueId("6F9619FF-8B86-D011-B42D-00C04FC964FF".to_string()),
            },
            BoundParameter {
                name: "@pFechaCorte".to_string(),
                data_type: DataType::DateOnly,
                value: SqlValue::Date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
            },
            BoundParameter {
                name: "@pIdBodega".to_string(),
                data_type: DataType::Integer,
                value: SqlValue::Null,
            },
        ]
    );

    assert_eq!(envelope.columns, vec!["Producto", "Cantidad"]);
    assert_eq!(envelope.total_records, 2);
    assert_eq!(envelope.data.len(), 2);
    assert_eq!(envelope.data[0]["Producto"], SqlValue::Text("Arroz".to_string()));
    assert_eq!(envelope.parameters.len(), 3);
    assert!(envelope.column_data_types[1].numeric);
}

#[test]
fn procedure_without_argument_list_binds_every_supplied_key() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(
        FakeCatalog::with(vec![definition("sp", StatementKind::StoredProcedure, "Sch.SpX")]),
        &runner,
    );

    let request = ExecutionRequest::new("sp").with_parameter("pIdBodega", text("5"));
    engine.execute(&request).unwrap();

    let commands = runner.commands();
    assert_eq!(commands[0].text, "Sch.SpX");
    assert_eq!(
        commands[0].parameters,
        vec![BoundParameter {
            name: "@pIdBodega".to_string(),
            data_type: DataType::Text,
            value: SqlValue::Text("5".to_string()),
        }]
    );
}

#[test]
fn procedure_binds_extra_keys_next_to_placeholders() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("saldo")
        .with_parameter("pIdEmpresa", text("6F9619FF-8B86-D011-B42D-00C04FC964FF"))
        .with_parameter("pFechaCorte", text("20240630"))
        .with_parameter("@pUsuario", text("admin"));
    engine.execute(&request).unwrap();

    let commands = runner.commands();
    let names: Vec<&str> = commands[0].parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["@pIdEmpresa", "@pFechaCorte", "@pUsuario"]);
}

#[test]
fn ad_hoc_dispatch_binds_unsent_optional_as_null() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(
        FakeCatalog::with(vec![definition(
            "q",
            StatementKind::AdHocQuery,
            "SELECT * FROM t WHERE a = @pCodigo AND (@pNombre = Null OR n = @pNombre)",
        )]),
        &runner,
    );

    let request = ExecutionRequest::new("q").with_parameter("pCodigo", ExternalValue::Integer(7));
    engine.execute(&request).unwrap();

    let commands = runner.commands();
    let command = &commands[0];
    assert_eq!(command.kind, CommandKind::Text);
    assert_eq!(
        command.text,
        "SELECT * FROM t WHERE a = @pCodigo AND (@pNombre = Null OR n = @pNombre)"
    );
    let bound: Vec<(&str, &SqlValue)> = command
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), &p.value))
        .collect();
    assert_eq!(
        bound,
        vec![("@pCodigo", &SqlValue::Integer(7)), ("@pNombre", &SqlValue::Null)]
    );
}

#[test]
fn zero_rows_is_success() {
    let raw = RawResult {
        columns: stock_result().columns,
        rows: Vec::new(),
    };
    let runner = FakeRunner::returning(Ok(raw));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("ventas")
        .with_parameter("@pFechaInicial", text("2024-01-01"))
        .with_parameter("@pFechaFinal", text("20240131"));
    let envelope = engine.execute(&request).unwrap();
    assert_eq!(envelope.columns, vec!["Producto", "Cantidad"]);
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.total_records, 0);
}

#[test]
fn no_data_driver_message_becomes_empty_envelope() {
    let runner = FakeRunner::returning(Err(RunnerError::Driver(
        "ORA-20001: No existe información para el corte".to_string(),
    )));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("ventas")
        .with_parameter("@pFechaInicial", text("20240101"))
        .with_parameter("@pFechaFinal", text("20240131"));
    let envelope = engine.execute(&request).unwrap();
    assert!(envelope.columns.is_empty());
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.total_records, 0);
    assert_eq!(envelope.parameters.len(), 3);
}

#[test]
fn no_content_status_becomes_empty_envelope() {
    let runner = FakeRunner::returning(Err(RunnerError::NoContent));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("ventas")
        .with_parameter("@pFechaInicial", text("20240101"))
        .with_parameter("@pFechaFinal", text("20240131"));
    assert_eq!(engine.execute(&request).unwrap().total_records, 0);
}

#[test]
fn driver_failure_is_surfaced_unmodified() {
    let message = "ORA-06550: line 1, column 7: PLS-00306: wrong number or types of arguments";
    let runner = FakeRunner::returning(Err(RunnerError::Driver(message.to_string())));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("saldo")
        .with_parameter("@pIdEmpresa", text("abc"))
        .with_parameter("@pFechaCorte", text("20240630"));
    let err = engine.execute(&request).unwrap_err();
    assert_eq!(err, ReportError::execution(message));
    assert!(!err.is_client_error());
    assert_eq!(runner.commands().len(), 1);
}

#[test]
fn reopen_parameters_fills_previous_values() {
    let runner = FakeRunner::returning(Ok(RawResult::default()));
    let engine = ReportEngine::new(catalog(), &runner);

    let mut previous = HashMap::new();
    previous.insert("@pFechaInicial".to_string(), text("20240101"));
    previous.insert("pIdVendedor".to_string(), ExternalValue::Integer(4));
    previous.insert("@pFechaFinal".to_string(), text(""));

    let params = engine.reopen_parameters("ventas", &previous).unwrap();
    assert_eq!(params[0].default_value, Some(SqlValue::Text("20240101".to_string())));
    assert_eq!(params[1].default_value, None);
    assert_eq!(params[2].default_value, Some(SqlValue::Integer(4)));
}

#[test]
fn envelope_serializes_with_camel_case_keys() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("ventas")
        .with_parameter("@pFechaInicial", text("20240101"))
        .with_parameter("@pFechaFinal", text("20240131"));
    let envelope = engine.execute(&request).unwrap();
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["totalRecords"], 2);
    assert_eq!(json["columns"][1], "Cantidad");
    assert_eq!(json["data"][1]["Cantidad"], 12);
    assert_eq!(json["parameters"][0]["displayName"], "Fecha Inicial");
    assert_eq!(json["parameters"][0]["dataType"], "DateOnly");
    assert_eq!(json["parameters"][1]["isRequired"], true);
    assert_eq!(json["parameters"][2]["isRequired"], false);
    assert!(json["parameters"][2]["defaultValue"].is_null());
}

#[test]
fn rows_keep_projection_order() {
    let runner = FakeRunner::returning(Ok(stock_result()));
    let engine = ReportEngine::new(catalog(), &runner);

    let request = ExecutionRequest::new("ventas")
        .with_parameter("@pFechaInicial", text("20240101"))
        .with_parameter("@pFechaFinal", text("20240131"));
    let envelope = engine.execute(&request).unwrap();
    let keys: Vec<&str> = envelope.data[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Producto", "Cantidad"]);
    assert_eq!(
        serde_json::to_string(&envelope.data[0]).unwrap(),
        r#"{"Producto":"Arroz","Cantidad":40}"#
    );
}

#[test]
fn json_boundary_values_are_unwrapped() {
    let payload = serde_json::json!({
        "a": "x",
        "b": 5,
        "c": 2.5,
        "d": true,
        "e": null,
        "f": [1, 2]
    });
    let values: HashMap<String, ExternalValue> = payload
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), ExternalValue::from_json(v)))
        .collect();
    assert_eq!(values["a"], text("x"));
    assert_eq!(values["b"], ExternalValue::Integer(5));
    assert_eq!(values["c"], ExternalValue::Float(2.5));
    assert_eq!(values["d"], ExternalValue::Boolean(true));
    assert_eq!(values["e"], ExternalValue::Null);
    assert_eq!(values["f"], text("[1,2]"));
}
