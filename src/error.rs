use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid { field: String, reason: String },

    // Target resolution errors
    #[error(
        "Database {database} has {count} branches in organization {organization}; \
         pass the branch name explicitly (interactive selection is unavailable)"
    )]
    AmbiguousTarget {
        organization: String,
        database: String,
        count: usize,
    },

    #[error("Database {database} does not exist in organization {organization}")]
    DatabaseNotFound {
        organization: String,
        database: String,
    },

    #[error("Database {database} has no branches in organization {organization}")]
    NoBranches {
        organization: String,
        database: String,
    },

    #[error(
        "Database {database} and branch {branch} does not exist in organization {organization}"
    )]
    TargetNotFound {
        organization: String,
        database: String,
        branch: String,
    },

    #[error("Branch {branch} of database {database} (organization: {organization}) is not ready yet")]
    BranchNotReady {
        organization: String,
        database: String,
        branch: String,
    },

    // Remote API errors
    #[error("API request failed: {0}")]
    Upstream(String),

    // Local session resources
    #[error("Could not create credential file: {reason}")]
    CredentialFilePersist { reason: String },

    #[error("Could not prepare history directory {path}: {reason}")]
    History { path: String, reason: String },

    // Tunnel errors
    #[error("Could not start tunnel to {instance}: {reason}")]
    TunnelStart { instance: String, reason: String },

    #[error("Tunnel error: {reason}")]
    Tunnel { reason: String },

    // Interactive client errors
    #[error("Could not inspect {binary} with {inspector}: {reason}")]
    Inspection {
        inspector: String,
        binary: String,
        reason: String,
    },

    #[error("Could not launch {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error(
        "mysql client exited with {} (organization: {organization}, database: {database}, branch: {branch})",
        code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
    )]
    ClientExit {
        code: Option<i32>,
        organization: String,
        database: String,
        branch: String,
    },

    #[error("Interrupted")]
    Cancelled,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // YAML errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

impl ShellError {
    /// Process exit status to report for this error.
    ///
    /// The interactive client's own status is propagated when it is known.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ClientExit { code: Some(code), .. } if *code != 0 => *code,
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
