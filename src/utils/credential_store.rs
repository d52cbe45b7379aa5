use keyring::Entry;

const SERVICE_NAME: &str = "space_report";
pub const PASSWORD_ENV: &str = "SPACE_REPORT_PASSWORD";

fn entry_for(connection_name: &str) -> Result<Entry, String> {
    Entry::new(SERVICE_NAME, connection_name).map_err(|e| format!("Keyring error: {}", e))
}

/// Store the database password for a connection in the OS keyring.
pub fn store_password(connection_name: &str, password: &str) -> Result<(), String> {
    entry_for(connection_name)?
        .set_password(password)
        .map_err(|e| format!("Failed to store password in keyring: {}", e))
}

/// Password for a connection: the environment override first, then the
/// keyring. Returns Ok(None) when neither has one.
pub fn get_password(connection_name: &str) -> Result<Option<String>, String> {
    if let Some(password) = password_from_env() {
        return Ok(Some(password));
    }
    match entry_for(connection_name)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(format!("Failed to retrieve password from keyring: {}", e)),
    }
}

/// Silently succeeds if no credential exists.
pub fn delete_password(connection_name: &str) -> Result<(), String> {
    match entry_for(connection_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(format!("Failed to delete password from keyring: {}", e)),
    }
}

fn password_from_env() -> Option<String> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|value| !value.is_empty())
}
