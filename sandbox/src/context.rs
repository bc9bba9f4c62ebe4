//! A throwaway directory holding everything one sample run needs.
//!
//! Every sample gets its own context, and its own `node` process, so no
//! binding, mock cache or global survives from one sample to the next. The
//! directory is removed when the context is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::ExecError;

const PRELUDE_FILE: &str = "prelude.cjs";
const RUNNER_FILE: &str = "runner.cjs";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";

pub struct Context {
    dir: TempDir,
}

impl Context {
    /// Lay out the prelude, the (already transpiled) program and the runner.
    ///
    /// The program file is named after `display_name` so stack traces
    /// read `010_Intro.md.tsx:51:7`.
    pub fn create(prelude: &str, program: &str, display_name: &str) -> Result<Self, ExecError> {
        let dir = tempfile::Builder::new().prefix("folio-").tempdir()?;
        let file_name = sanitize(display_name);

        fs::write(dir.path().join("package.json"), "{ \"type\": \"commonjs\" }\n")?;
        fs::write(dir.path().join(PRELUDE_FILE), prelude)?;
        fs::write(dir.path().join(&file_name), program)?;
        fs::write(dir.path().join(RUNNER_FILE), runner(&file_name))?;

        tracing::trace!(dir = %dir.path().display(), sample = %file_name, "context created");
        Ok(Context { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn runner(&self) -> PathBuf {
        self.dir.path().join(RUNNER_FILE)
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.dir.path().join(STDOUT_FILE)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.dir.path().join(STDERR_FILE)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        format!("sample{}", cleaned)
    } else {
        cleaned
    }
}

/// Loads the prelude, runs the sample, waits for every promise it
/// registered and always runs teardown. Any throw or rejection is written
/// to stderr and turns into exit code 1.
fn runner(sample_file: &str) -> String {
    let path = serde_json::Value::String(format!("./{}", sample_file)).to_string();
    format!(
        r#"'use strict';
require('./{PRELUDE_FILE}');

const main = async () => {{
  try {{
    require({path});
    while (__folio.pending.length > 0) {{
      await Promise.all(__folio.pending.splice(0));
    }}
  }} finally {{
    for (const hook of __folio.teardown) {{
      await hook();
    }}
  }}
}};

main().catch((error) => {{
  const text = error && error.stack ? error.stack : String(error);
  process.stderr.write(text + '\n');
  process.exitCode = 1;
}});
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_files() {
        let ctx = Context::create("// prelude", "test(true)", "010_Intro.md.js").unwrap();
        assert_eq!(
            fs::read_to_string(ctx.dir().join("010_Intro.md.js")).unwrap(),
            "test(true)"
        );
        assert_eq!(
            fs::read_to_string(ctx.dir().join(PRELUDE_FILE)).unwrap(),
            "// prelude"
        );
        let runner = fs::read_to_string(ctx.runner()).unwrap();
        assert!(runner.contains(r#"require("./010_Intro.md.js");"#));
        assert!(runner.contains("__folio.teardown"));
    }

    #[test]
    fn directory_removed_on_drop() {
        let ctx = Context::create("", "", "a.md.ts").unwrap();
        let dir = ctx.dir().to_path_buf();
        assert!(dir.exists());
        drop(ctx);
        assert!(!dir.exists());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize("../x.md.js"), "sample.._x.md.js");
        assert_eq!(sanitize("a/b.md.ts"), "a_b.md.ts");
        assert_eq!(sanitize(""), "sample");
        assert_eq!(sanitize("010_Intro.md.tsx"), "010_Intro.md.tsx");
    }
}
