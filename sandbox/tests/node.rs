//! Runs real samples through Node.js. Skipped when `node` is not installed.

use manuscript::parser::Parser;
use manuscript::sample::{ExtractOptions, Language, Sample, extract};
use sandbox::{Environment, ExecError, Executor, NodeExecutor, Transpiler, Verdict};

fn executor() -> Option<NodeExecutor> {
    if which::which("node").is_err() {
        eprintln!("node not found, skipping");
        return None;
    }
    let env = Environment::book_defaults(std::env::temp_dir());
    Some(NodeExecutor::new("node", &env, Transpiler::passthrough()).expect("node executor"))
}

fn sample(header: &str, body: &str, footer: &str, start_line: usize) -> Sample {
    Sample {
        language: Language::Js,
        header: header.to_string(),
        body: body.to_string(),
        footer: footer.to_string(),
        chapter_title: "Node".to_string(),
        start_line,
    }
}

fn run(exec: &NodeExecutor, sample: &Sample) -> Verdict {
    let name = sample.display_name("010_Node.md");
    exec.execute(&sample.source_unit(), &name, sample.language)
}

fn failure(verdict: Verdict) -> ExecError {
    match verdict {
        Verdict::Fail(err) => err,
        Verdict::Pass => panic!("expected the sample to fail"),
    }
}

#[test]
fn passing_sample() {
    let Some(exec) = executor() else { return };
    let verdict = run(&exec, &sample("const a = 2;", "expect(a * 2).toBe(4);", "", 3));
    assert!(verdict.is_pass(), "{:?}", verdict);
}

#[test]
fn failing_assertion() {
    let Some(exec) = executor() else { return };
    let err = failure(run(&exec, &sample("", "expect(1).toBe(2);", "", 3)));
    assert!(matches!(err, ExecError::Runtime { status: Some(1), .. }));
    assert!(err.cause().contains("AssertionError"));
}

#[test]
fn fs_is_mocked() {
    let Some(exec) = executor() else { return };
    let body = "const fs = require('fs');\ntest(fs.readFileSync('foo.txt') === 'foo.txt');";
    let verdict = run(&exec, &sample("", body, "", 1));
    assert!(verdict.is_pass(), "{:?}", verdict);
}

#[test]
fn node_prefixed_builtins_are_mocked() {
    let Some(exec) = executor() else { return };
    let body = "const fs = require('node:fs');\ntest(fs.readFileSync('foo.txt') === 'foo.txt');\ntest(fs === require('fs'));";
    let verdict = run(&exec, &sample("", body, "", 1));
    assert!(verdict.is_pass(), "{:?}", verdict);
}

#[test]
fn samples_do_not_share_state() {
    let Some(exec) = executor() else { return };
    let first = sample("", "globalThis.leaked = 1;\nconst shared = 1;", "", 1);
    let second = sample("", "const shared = 2;\ntest(globalThis.leaked === undefined);", "", 1);
    assert!(run(&exec, &first).is_pass());
    let verdict = run(&exec, &second);
    assert!(verdict.is_pass(), "{:?}", verdict);
}

#[test]
fn rejected_promise_fails() {
    let Some(exec) = executor() else { return };
    let body = "test(async () => {\n  await null;\n  throw new Error('late');\n});";
    let err = failure(run(&exec, &sample("", body, "", 1)));
    assert!(err.cause().contains("late"));

    let err = failure(run(
        &exec,
        &sample("", "expect(Promise.resolve(1)).resolves.toBe(2);", "", 1),
    ));
    assert!(err.cause().contains("expected 1 to be 2"));
}

#[test]
fn stack_trace_points_at_manuscript_line() {
    let Some(exec) = executor() else { return };
    let err = failure(run(&exec, &sample("", "throw new Error('boom');", "", 50)));
    let cause = err.cause();
    assert!(cause.contains("010_Node.md.js:51:"), "{}", cause);
}

#[test]
fn instrumented_branch_is_observable() {
    let Some(exec) = executor() else { return };
    let body = "if (1 + 1 === 2) {\n  // reached\n}";
    let verdict = run(&exec, &sample("", body, "test($1, 'branch was not taken');", 1));
    assert!(verdict.is_pass(), "{:?}", verdict);
}

#[test]
fn timeout_kills_runaway_sample() {
    let Some(exec) = executor() else { return };
    let exec = exec.with_timeout(std::time::Duration::from_millis(500));
    let err = failure(run(&exec, &sample("", "while (true) {}", "", 1)));
    assert!(matches!(err, ExecError::Timeout { .. }));
}

#[test]
fn greeting_end_to_end() {
    let Some(exec) = executor() else { return };
    let source = "## Greeting\n\n<!-- function greet(){return 'hi'} -->\n\n```js\ntest(typeof greet === 'function')\n```\n";
    let tree = Parser::new(source, 0).parse().expect("parse failed");
    let found = extract(&tree, &ExtractOptions::default());
    assert_eq!(found.len(), 1);
    let verdict = run(&exec, &found[0]);
    assert!(verdict.is_pass(), "{:?}", verdict);
}
