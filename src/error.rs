use thiserror::Error;

/// Message shown when an explicit compile finds no tool path.
pub const MISSING_TOOL_MESSAGE: &str = "Can't find javascool-light.jar file, please specify the location of the file in user's settings.json";

/// Remediation offered alongside [`MISSING_TOOL_MESSAGE`].
pub const OPEN_SETTINGS_ACTION: &str = "Open User Settings";

/// Launcher failure
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Explicit compile requested with no tool path configured
    #[error("{}", MISSING_TOOL_MESSAGE)]
    MissingConfiguration,

    /// The host could not start a process
    #[error("failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for launcher operations
pub type LaunchResult<T> = Result<T, LaunchError>;
