use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use manuscript::sample::Language;

use crate::error::ExecError;
use crate::executor::wait_timeout;

/// Turns a source unit into plain CommonJS JavaScript.
///
/// Each language maps to an external command that reads the unit on stdin
/// and writes the result to stdout. `{lang}` and `{name}` in the arguments
/// are replaced with the language tag and the sample's display name. A
/// language without a command is passed through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transpiler {
    commands: BTreeMap<Language, Vec<String>>,
}

impl Transpiler {
    /// No transpilation at all: every language is passed through.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// esbuild for every language, CommonJS output with inline source maps
    /// so stack traces point back at the manuscript lines.
    pub fn esbuild(program: &str) -> Self {
        let argv: Vec<String> = [
            program,
            "--loader={lang}",
            "--format=cjs",
            "--platform=node",
            "--jsx=transform",
            "--sourcemap=inline",
            "--sourcefile={name}",
            "--log-level=error",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Language::ALL
            .into_iter()
            .fold(Self::default(), |t, lang| t.with_command(lang, argv.clone()))
    }

    /// Set the command for `language`. An empty command means pass-through.
    pub fn with_command(mut self, language: Language, argv: Vec<String>) -> Self {
        if argv.is_empty() {
            self.commands.remove(&language);
        } else {
            self.commands.insert(language, argv);
        }
        self
    }

    pub fn command(&self, language: Language) -> Option<&[String]> {
        self.commands.get(&language).map(Vec::as_slice)
    }

    /// Transpile `unit`, killing the command once `timeout` passes.
    /// Failures carry the untranspiled display name.
    pub fn transpile(
        &self,
        unit: &str,
        name: &str,
        language: Language,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let Some(argv) = self.command(language) else {
            return Ok(unit.to_string());
        };

        let argv: Vec<String> = argv
            .iter()
            .map(|arg| arg.replace("{lang}", language.tag()).replace("{name}", name))
            .collect();
        let fail = |message: String| ExecError::Transpile {
            name: name.to_string(),
            message,
        };

        tracing::debug!(name, program = %argv[0], "transpiling");

        // Output goes to files so a command that streams while it reads
        // never blocks on a full pipe.
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?)
            .spawn()
            .map_err(|e| fail(format!("cannot run `{}`: {}", argv[0], e)))?;

        let writer = child.stdin.take().map(|mut stdin| {
            let unit = unit.to_string();
            thread::spawn(move || stdin.write_all(unit.as_bytes()))
        });

        let Some(status) = wait_timeout(&mut child, timeout)? else {
            return Err(ExecError::Timeout {
                name: name.to_string(),
                timeout,
            });
        };
        if let Some(Ok(Err(e))) = writer.map(thread::JoinHandle::join) {
            tracing::trace!(name, error = %e, "transpiler did not read all input");
        }

        if !status.success() {
            let message = read_all(&mut stderr)?;
            return Err(fail(String::from_utf8_lossy(&message).trim().to_string()));
        }

        String::from_utf8(read_all(&mut stdout)?).map_err(|e| fail(format!("output is not UTF-8: {}", e)))
    }
}

fn read_all(file: &mut File) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(10);

    #[test]
    fn passthrough_returns_unit() {
        let unit = "const a: number = 1;";
        let out = Transpiler::passthrough()
            .transpile(unit, "a.md.ts", Language::Ts, LIMIT)
            .unwrap();
        assert_eq!(out, unit);
    }

    #[test]
    fn esbuild_covers_every_language() {
        let transpiler = Transpiler::esbuild("esbuild");
        for lang in Language::ALL {
            let argv = transpiler.command(lang).unwrap();
            assert_eq!(argv[0], "esbuild");
            assert!(argv.contains(&"--sourcefile={name}".to_string()));
        }
    }

    #[test]
    fn empty_command_restores_passthrough() {
        let transpiler = Transpiler::esbuild("esbuild").with_command(Language::Js, Vec::new());
        assert!(transpiler.command(Language::Js).is_none());
        assert!(transpiler.command(Language::Tsx).is_some());
    }

    #[test]
    fn missing_program_is_a_transpile_error() {
        let transpiler = Transpiler::passthrough().with_command(
            Language::Tsx,
            vec!["folio-definitely-not-a-transpiler".to_string()],
        );
        let err = transpiler
            .transpile("<App />", "010_Intro.md.tsx", Language::Tsx, LIMIT)
            .unwrap_err();
        match err {
            ExecError::Transpile { name, message } => {
                assert_eq!(name, "010_Intro.md.tsx");
                assert!(message.contains("cannot run"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_output_replaces_unit() {
        let transpiler = Transpiler::passthrough().with_command(
            Language::Ts,
            vec!["sh".into(), "-c".into(), "tr a-z A-Z".into()],
        );
        let out = transpiler.transpile("let a;", "a.md.ts", Language::Ts, LIMIT).unwrap();
        assert_eq!(out, "LET A;");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_stderr() {
        let transpiler = Transpiler::passthrough().with_command(
            Language::Jsx,
            vec!["sh".into(), "-c".into(), "echo 'Unexpected token' >&2; exit 1".into()],
        );
        let err = transpiler.transpile("<", "b.md.jsx", Language::Jsx, LIMIT).unwrap_err();
        assert_eq!(err.to_string(), "cannot transpile b.md.jsx: Unexpected token");
    }

    #[cfg(unix)]
    #[test]
    fn hung_command_times_out() {
        let transpiler = Transpiler::passthrough().with_command(
            Language::Ts,
            vec!["sh".into(), "-c".into(), "sleep 5".into()],
        );
        let started = std::time::Instant::now();
        let err = transpiler
            .transpile("let a;", "c.md.ts", Language::Ts, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { ref name, .. } if name == "c.md.ts"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn large_unit_streams_through() {
        let transpiler = Transpiler::passthrough().with_command(Language::Js, vec!["cat".into()]);
        let unit = "console.log('a line of sample code');\n".repeat(8_000);
        let out = transpiler.transpile(&unit, "d.md.js", Language::Js, LIMIT).unwrap();
        assert_eq!(out.len(), unit.len());
        assert_eq!(out, unit);
    }
}
