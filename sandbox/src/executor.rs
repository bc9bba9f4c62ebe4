use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use manuscript::sample::Language;

use crate::context::Context;
use crate::environment::Environment;
use crate::error::ExecError;
use crate::transpile::Transpiler;

/// Default wall-clock limit for one sample.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of running one sample.
#[derive(Debug)]
pub enum Verdict {
    Pass,
    Fail(ExecError),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Runs a source unit to completion.
///
/// `display_name` is the file name the unit is reported under, e.g.
/// `010_Intro.md.tsx`.
pub trait Executor {
    fn execute(&self, unit: &str, display_name: &str, language: Language) -> Verdict;
}

/// Runs each sample in a fresh Node.js process.
pub struct NodeExecutor {
    runtime: PathBuf,
    prelude: String,
    transpiler: Transpiler,
    timeout: Duration,
}

impl NodeExecutor {
    /// Locate `runtime` on `PATH` (or use it as a path) and render the
    /// prelude for `env` once for the whole run.
    pub fn new(runtime: &str, env: &Environment, transpiler: Transpiler) -> Result<Self, ExecError> {
        let resolved = which::which(runtime).map_err(|source| ExecError::RuntimeMissing {
            runtime: runtime.to_string(),
            source,
        })?;
        tracing::debug!(runtime = %resolved.display(), "using JavaScript runtime");

        Ok(NodeExecutor {
            runtime: resolved,
            prelude: env.prelude(),
            transpiler,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, unit: &str, display_name: &str, language: Language) -> Result<(), ExecError> {
        // Transpiling and running share one time budget.
        let started = Instant::now();
        let program = self
            .transpiler
            .transpile(unit, display_name, language, self.timeout)?;
        let ctx = Context::create(&self.prelude, &program, display_name)?;

        let mut child = Command::new(&self.runtime)
            .arg("--enable-source-maps")
            .arg(ctx.runner())
            .current_dir(ctx.dir())
            .stdin(Stdio::null())
            .stdout(File::create(ctx.stdout_path())?)
            .stderr(File::create(ctx.stderr_path())?)
            .spawn()?;
        tracing::trace!(name = display_name, pid = child.id(), "spawned");

        let remaining = self.timeout.saturating_sub(started.elapsed());
        let Some(status) = wait_timeout(&mut child, remaining)? else {
            return Err(ExecError::Timeout {
                name: display_name.to_string(),
                timeout: self.timeout,
            });
        };

        if status.success() {
            return Ok(());
        }

        let stderr = fs::read_to_string(ctx.stderr_path()).unwrap_or_default();
        Err(ExecError::Runtime {
            name: display_name.to_string(),
            status: status.code(),
            stderr,
        })
    }
}

/// Wait for `child` until `timeout` passes, then kill it. `None` means the
/// child was killed.
pub(crate) fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // The process may exit between the check and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl Executor for NodeExecutor {
    fn execute(&self, unit: &str, display_name: &str, language: Language) -> Verdict {
        let started = Instant::now();
        let verdict = match self.run(unit, display_name, language) {
            Ok(()) => Verdict::Pass,
            Err(err) => Verdict::Fail(err),
        };
        tracing::debug!(
            name = display_name,
            pass = verdict.is_pass(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sample finished"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_runtime_is_reported() {
        let env = Environment::bare(".");
        let err = NodeExecutor::new("folio-no-such-runtime", &env, Transpiler::passthrough())
            .err()
            .unwrap();
        assert!(matches!(err, ExecError::RuntimeMissing { ref runtime, .. } if runtime == "folio-no-such-runtime"));
    }

    #[test]
    fn verdict_pass() {
        assert!(Verdict::Pass.is_pass());
        let fail = Verdict::Fail(ExecError::Transpile {
            name: "a.md.js".into(),
            message: "x".into(),
        });
        assert!(!fail.is_pass());
    }
}
