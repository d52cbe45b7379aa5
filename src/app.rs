use clap::{Parser, Subcommand};
use log::{error, warn};
use std::collections::HashMap;
use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::db::OracleRunner;
use crate::report::{ExecutionRequest, ExternalValue, ReportEngine, ReportError};
use crate::utils::{credential_store, init_logging, AppConfig, FileCatalog};

#[derive(Parser, Debug)]
#[command(name = "space_report")]
#[command(version)]
#[command(about = "Run parameterized reports from a report catalog against Oracle")]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List catalog modules and their reports
    Modules,
    /// Show the parameters a report needs
    Params {
        report_id: String,
    },
    /// Show the parameters found in an arbitrary statement
    Analyze {
        statement: String,
    },
    /// Execute a report and print the result as JSON
    Run {
        report_id: String,
        /// Parameter value as NAME=VALUE (repeatable)
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Parameter values as a JSON object
        #[arg(long, value_name = "OBJECT")]
        json: Option<String>,
    },
    /// Show a report's parameters pre-filled with previous values
    Reopen {
        report_id: String,
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        #[arg(long, value_name = "OBJECT")]
        json: Option<String>,
    },
    /// Read a password from stdin and store it in the OS keyring
    SetPassword,
    /// Remove the stored password for the configured connection
    DeletePassword,
    /// Write the active configuration to the config file
    InitConfig,
}

pub struct App {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Self {
        let (config, problem) = AppConfig::load_or_default(config_path);
        init_logging(&config.log_level);
        if let Some(err) = problem {
            warn!("{err}; using default configuration");
        }
        Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
        }
    }

    /// Run a command and return the process exit code.
    pub fn run(&self, command: Command) -> i32 {
        match self.dispatch(command) {
            Ok(()) => 0,
            Err(err) => {
                error!("{err}");
                eprintln!("Error: {err}");
                match err.downcast_ref::<ReportError>() {
                    Some(report_err) if report_err.is_client_error() => 2,
                    _ => 1,
                }
            }
        }
    }

    fn dispatch(&self, command: Command) -> Result<(), Box<dyn Error>> {
        match command {
            Command::Modules => self.list_modules(),
            Command::Params { report_id } => {
                let catalog = self.catalog()?;
                let params = ReportEngine::new(&catalog, NoRunner).parameters(&report_id)?;
                println!("{}", serde_json::to_string_pretty(&params)?);
                Ok(())
            }
            Command::Analyze { statement } => {
                let params = ReportEngine::<FileCatalog, OracleRunner>::analyze(&statement);
                println!("{}", serde_json::to_string_pretty(&params)?);
                Ok(())
            }
            Command::Run {
                report_id,
                params,
                json,
            } => self.run_report(&report_id, &params, json.as_deref()),
            Command::Reopen {
                report_id,
                params,
                json,
            } => {
                let catalog = self.catalog()?;
                let previous = parse_parameters(&params, json.as_deref())?;
                let descriptors =
                    ReportEngine::new(&catalog, NoRunner).reopen_parameters(&report_id, &previous)?;
                println!("{}", serde_json::to_string_pretty(&descriptors)?);
                Ok(())
            }
            Command::SetPassword => {
                let mut password = String::new();
                io::stdin().lock().read_line(&mut password)?;
                let password = password.trim_end_matches(['\r', '\n']);
                credential_store::store_password(&self.config.connection.name, password)?;
                println!(
                    "Password stored for {}",
                    self.config.connection.display_string()
                );
                Ok(())
            }
            Command::DeletePassword => {
                credential_store::delete_password(&self.config.connection.name)?;
                println!(
                    "Password removed for {}",
                    self.config.connection.display_string()
                );
                Ok(())
            }
            Command::InitConfig => {
                self.config.save(self.config_path.as_deref())?;
                if let Some(path) = self.config_path.clone().or_else(AppConfig::config_path) {
                    println!("Configuration written to {}", path.display());
                }
                Ok(())
            }
        }
    }

    fn list_modules(&self) -> Result<(), Box<dyn Error>> {
        let catalog = self.catalog()?;
        for module in catalog.modules() {
            let marker = if module.active { "" } else { " (inactive)" };
            println!("{} - {}{}", module.id, module.name, marker);
            for report in catalog.reports_by_module(&module.id) {
                println!("    {} - {} [{:?}]", report.id, report.title, report.kind);
            }
        }
        Ok(())
    }

    fn run_report(
        &self,
        report_id: &str,
        params: &[String],
        json: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        let catalog = self.catalog()?;
        let password = credential_store::get_password(&self.config.connection.name)?
            .unwrap_or_default();
        let runner = OracleRunner::new(self.config.connection.clone().with_password(password));
        let engine = ReportEngine::new(catalog, runner);

        let mut request = ExecutionRequest::new(report_id);
        for (name, value) in parse_parameters(params, json)? {
            request = request.with_parameter(&name, value);
        }
        let envelope = engine.execute(&request)?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        Ok(())
    }

    fn catalog(&self) -> Result<FileCatalog, Box<dyn Error>> {
        let path = self
            .config
            .resolved_catalog_path()
            .ok_or("No report catalog path configured")?;
        Ok(FileCatalog::load(&path)?)
    }
}

/// Catalog-only commands never reach a database.
struct NoRunner;

impl crate::report::StatementRunner for NoRunner {
    fn run(
        &self,
        _command: &crate::report::Command,
    ) -> Result<crate::report::RawResult, crate::report::RunnerError> {
        Err(crate::report::RunnerError::Driver(
            "No database connection for this command".to_string(),
        ))
    }
}

/// `-p NAME=VALUE` pairs are text; `--json` values keep their JSON shape.
/// Keys are stored without the `@` sigil and a later key replaces any
/// earlier one that differs only in sigil or case, so `-p` wins over `--json`.
pub fn parse_parameters(
    pairs: &[String],
    json: Option<&str>,
) -> Result<HashMap<String, ExternalValue>, Box<dyn Error>> {
    let mut parameters = HashMap::new();

    if let Some(json) = json {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value
            .as_object()
            .ok_or("--json must be a JSON object of parameter values")?;
        for (name, value) in object {
            insert_parameter(&mut parameters, name, ExternalValue::from_json(value));
        }
    }

    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected NAME=VALUE, got '{pair}'"))?;
        insert_parameter(&mut parameters, name, ExternalValue::from(value));
    }

    Ok(parameters)
}

fn insert_parameter(parameters: &mut HashMap<String, ExternalValue>, name: &str, value: ExternalValue) {
    let name = name.trim().trim_start_matches('@');
    parameters.retain(|key, _| !key.eq_ignore_ascii_case(name));
    parameters.insert(name.to_string(), value);
}
