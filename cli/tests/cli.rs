use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn book(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        fs::write(dir.path().join(name), text).unwrap();
    }
    dir
}

fn folio(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_folio"))
        .args(args)
        .current_dir(cwd)
        .env("FOLIO_LOG", "off")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn stats_counts_code() {
    let dir = book(&[(
        "010_Intro.md",
        "# Intro\n\n```js\nconst a = 1;\nconst b = 2;\n```\n\n```bash\nls\n```\n",
    )]);
    let output = folio(dir.path(), &["stats", "."]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Number of code examples: 2"), "{}", out);
    assert!(out.contains("Number of lines of code: 3"), "{}", out);
}

#[test]
fn lint_fails_on_broken_links() {
    let dir = book(&[
        ("010_Intro.md", "{#intro}\n\n# Introduction\n\nSee [Setup](#setup).\n"),
        ("020_Setup.md", "{#setup}\n\n## Set up\n\nBack to [Introduction](#intro).\n"),
    ]);
    let output = folio(dir.path(), &["--no-color", "lint", "."]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("setup"));
}

#[test]
fn lint_passes_on_clean_book() {
    let dir = book(&[
        ("010_Intro.md", "{#intro}\n\n# Introduction\n\nSee [Setup](#setup).\n"),
        ("020_Setup.md", "{#setup}\n\n## Setup\n\nBack to [Introduction](#intro).\n"),
    ]);
    let output = folio(dir.path(), &["lint", "."]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn list_prints_test_names() {
    let dir = book(&[
        ("010_Setup.md", "# Setup\n\n```js\na()\n```\n\n```tsx\n<B />\n```\n"),
        ("020_Prose.md", "# Prose\n"),
        ("030_More.md", "# Setup\n\n```ts\nc()\n```\n"),
    ]);
    let output = folio(dir.path(), &["list", "."]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "010_Setup.md\n  Setup 1\n  Setup 2\n020_Prose.md\n  020_Prose.md has no code samples\n030_More.md\n  Setup 3\n"
    );
}

#[test]
fn parse_errors_abort_the_run() {
    let dir = book(&[("010_Broken.md", "# Broken\n\n```js\nnever closed\n")]);
    let output = folio(dir.path(), &["--no-color", "test", "."]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("code block is never closed"));
}

#[test]
fn missing_manuscript_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = folio(dir.path(), &["stats"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn config_file_is_applied() {
    let dir = book(&[("folio.toml", "manuscript = \"chapters\"\n")]);
    fs::create_dir(dir.path().join("chapters")).unwrap();
    fs::write(dir.path().join("chapters/a.md"), "```js\nx\n```\n").unwrap();
    let output = folio(dir.path(), &["stats"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Number of code examples: 1"));

    fs::write(dir.path().join("folio.toml"), "manuscrpt = \"chapters\"\n").unwrap();
    let output = folio(dir.path(), &["stats"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn runs_samples_with_node() {
    if which_node().is_none() {
        eprintln!("node not found, skipping");
        return;
    }
    let config = "[transpile]\njs = []\n";
    let dir = book(&[
        ("folio.toml", config),
        (
            "010_Greeting.md",
            "## Greeting\n\n<!-- function greet(){return 'hi'} -->\n\n```js\ntest(typeof greet === 'function')\n```\n\n```js\nexpect(greet()).toBe('bye')\n```\n",
        ),
    ]);
    fs::create_dir(dir.path().join("manuscript")).unwrap();
    fs::rename(
        dir.path().join("010_Greeting.md"),
        dir.path().join("manuscript/010_Greeting.md"),
    )
    .unwrap();

    let output = folio(dir.path(), &["--no-color"]);
    let err = stderr(&output);
    assert_eq!(output.status.code(), Some(1), "{}", err);
    assert!(err.contains("PASS  Greeting 1"), "{}", err);
    assert!(err.contains("FAIL  Greeting 2"), "{}", err);
    assert!(err.contains("1 passed, 1 failed"), "{}", err);

    let output = folio(dir.path(), &["--no-color", "test", "--filter", "Greeting 1"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = folio(dir.path(), &["--no-color", "--filter", "Greeting 1"]);
    let err = stderr(&output);
    assert!(output.status.success(), "{}", err);
    assert!(!err.contains("Greeting 2"), "{}", err);
}

fn which_node() -> Option<()> {
    Command::new("node").arg("--version").output().ok().filter(|o| o.status.success()).map(|_| ())
}
