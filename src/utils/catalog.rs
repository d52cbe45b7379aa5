use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::report::{ReportCatalog, ReportDefinition};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub reports: Vec<ReportDefinition>,
}

fn default_active() -> bool {
    true
}

/// Report definitions grouped by module, stored as a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCatalog {
    #[serde(default)]
    pub modules: Vec<ReportModule>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            warn!("Report catalog {} not found; using an empty catalog", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| CatalogError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn modules(&self) -> &[ReportModule] {
        &self.modules
    }

    pub fn reports_by_module(&self, module_id: &str) -> Vec<&ReportDefinition> {
        self.modules
            .iter()
            .filter(|module| module.id == module_id)
            .flat_map(|module| module.reports.iter())
            .collect()
    }

    pub fn all_reports(&self) -> impl Iterator<Item = (&ReportModule, &ReportDefinition)> {
        self.modules
            .iter()
            .flat_map(|module| module.reports.iter().map(move |report| (module, report)))
    }
}

impl ReportCatalog for FileCatalog {
    fn find_report(&self, id: &str) -> Option<ReportDefinition> {
        self.all_reports()
            .find(|(_, report)| report.id == id)
            .map(|(_, report)| report.clone())
    }
}
