use log::{debug, error, info, warn};
use std::collections::HashMap;

use super::{
    ExecutionDispatcher, ExecutionRequest, ExternalValue, Outcome, ParameterAnalyzer,
    ParameterDescriptor, ReportDefinition, ReportError, ResultEnvelope, ResultShaper,
    StatementKind, StatementRunner, ValueCoercer,
};

/// Read-only access to stored report definitions.
pub trait ReportCatalog {
    fn find_report(&self, id: &str) -> Option<ReportDefinition>;
}

impl<T: ReportCatalog + ?Sized> ReportCatalog for &T {
    fn find_report(&self, id: &str) -> Option<ReportDefinition> {
        (**self).find_report(id)
    }
}

pub struct ReportEngine<C, R> {
    catalog: C,
    runner: R,
}

impl<C: ReportCatalog, R: StatementRunner> ReportEngine<C, R> {
    pub fn new(catalog: C, runner: R) -> Self {
        Self { catalog, runner }
    }

    pub fn analyze(statement: &str) -> Vec<ParameterDescriptor> {
        ParameterAnalyzer::analyze(statement)
    }

    pub fn report(&self, report_id: &str) -> Result<ReportDefinition, ReportError> {
        self.catalog
            .find_report(report_id)
            .ok_or_else(|| ReportError::UnknownReport {
                id: report_id.to_string(),
            })
    }

    pub fn parameters(&self, report_id: &str) -> Result<Vec<ParameterDescriptor>, ReportError> {
        let report = self.report(report_id)?;
        Ok(ParameterAnalyzer::analyze(&report.statement))
    }

    /// Descriptors for the "modify filters" flow, pre-filled with the
    /// values the caller used last time.
    pub fn reopen_parameters(
        &self,
        report_id: &str,
        previous: &HashMap<String, ExternalValue>,
    ) -> Result<Vec<ParameterDescriptor>, ReportError> {
        let mut parameters = self.parameters(report_id)?;
        for param in parameters.iter_mut() {
            param.default_value = ValueCoercer::lookup(previous, &param.name)
                .and_then(|value| ValueCoercer::initial_value(param.data_type, value));
        }
        Ok(parameters)
    }

    pub fn execute(&self, request: &ExecutionRequest) -> Result<ResultEnvelope, ReportError> {
        let report = self.report(&request.report_id)?;
        let descriptors = ParameterAnalyzer::analyze(&report.statement);

        if report.kind == StatementKind::AdHocQuery {
            for key in request.parameters.keys() {
                let bare = key.trim_start_matches('@');
                if !descriptors.iter().any(|d| d.name.eq_ignore_ascii_case(bare)) {
                    debug!(
                        "Ignoring parameter {} not referenced by report '{}'",
                        key, report.id
                    );
                }
            }
        }

        let coerced = ValueCoercer::coerce_all(&descriptors, &request.parameters)?;
        let command = ExecutionDispatcher::build_command(&report, &coerced, &request.parameters)?;

        info!(
            "Executing report '{}' ({}) as {:?}",
            report.id, report.title, report.kind
        );

        match ExecutionDispatcher::dispatch(&self.runner, &command) {
            Ok(raw) => {
                let envelope = ResultShaper::shape(raw, descriptors);
                info!(
                    "Report '{}' returned {} rows in {} columns",
                    report.id,
                    envelope.total_records,
                    envelope.columns.len()
                );
                Ok(envelope)
            }
            Err(err) => match ResultShaper::classify(&err) {
                Outcome::Empty => {
                    warn!("Report '{}' reported no data: {:?}", report.id, err);
                    Ok(ResultShaper::empty(descriptors))
                }
                Outcome::Failure(message) => {
                    error!("Report '{}' failed: {}", report.id, message);
                    Err(ReportError::Execution { message })
                }
            },
        }
    }
}
