use log::{debug, warn};
use oracle::{Connection, Error as OracleError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionInfo {
    pub name: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
}

impl ConnectionInfo {
    pub fn connection_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} ({}@{}:{}/{})",
            self.name, self.username, self.host, self.port, self.service_name
        )
    }

    pub fn with_password(mut self, password: String) -> Self {
        self.password = password;
        self
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            username: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 1521,
            service_name: "ORCL".to_string(),
        }
    }
}

/// Open a fresh connection for a single report execution. The caller owns
/// it and drops it when the request ends.
pub fn open_connection(info: &ConnectionInfo) -> Result<Connection, OracleError> {
    debug!("Connecting to {}", info.display_string());
    let connection = Connection::connect(&info.username, &info.password, info.connection_string())?;
    apply_default_session_settings(&connection);
    Ok(connection)
}

fn apply_default_session_settings(conn: &Connection) {
    let statements = [
        "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
        "ALTER SESSION SET NLS_DATE_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
    ];

    for statement in statements {
        if let Err(err) = conn.execute(statement, &[]) {
            warn!("Failed to apply session setting `{statement}`: {err}");
        }
    }
}
