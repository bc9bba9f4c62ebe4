use std::io;
use std::time::Duration;

use thiserror::Error;

/// Why a sample did not pass.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("`{runtime}` not found: {source}")]
    RuntimeMissing {
        runtime: String,
        #[source]
        source: which::Error,
    },

    /// The transpiler rejected the source, or could not be started.
    #[error("cannot transpile {name}: {message}")]
    Transpile { name: String, message: String },

    /// The sample threw, or a promise it registered rejected.
    #[error("{name} failed{}:\n{stderr}", exit_suffix(.status))]
    Runtime {
        name: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("{name} timed out after {:.1}s", .timeout.as_secs_f64())]
    Timeout { name: String, timeout: Duration },

    #[error("sandbox I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_suffix(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!(" with exit code {}", code),
        None => " (killed by signal)".to_string(),
    }
}

impl ExecError {
    /// The failure text without the sample name, for compact reports.
    pub fn cause(&self) -> String {
        match self {
            ExecError::Runtime { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }
}
