use manuscript::Tree;
use manuscript::document::Document;
use manuscript::naming::TestNamer;
use manuscript::parser::{ParseError, Parser};
use manuscript::sample::{ExtractOptions, Sample, extract};
use sandbox::{Executor, Verdict};

/// One test case: a named sample, or the placeholder for a document
/// without samples.
#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    /// File name the sample runs under, e.g. `010_Intro.md.tsx`.
    pub display_name: String,
    pub sample: Option<Sample>,
}

/// All cases of one document, named after its file.
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub cases: Vec<Case>,
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub name: String,
    pub display_name: String,
    pub outcome: TestOutcome,
}

pub struct SuiteResult {
    pub name: String,
    pub results: Vec<TestResult>,
}

/// Parse every document. Errors from all documents are collected; any
/// error aborts the run. Document `i` is parsed with file id `i`.
pub fn parse_all(documents: &[Document]) -> Result<Vec<Tree>, Vec<ParseError>> {
    let mut trees = Vec::with_capacity(documents.len());
    let mut errors = Vec::new();
    for (file_id, document) in documents.iter().enumerate() {
        match Parser::new(&document.text, file_id).parse() {
            Ok(tree) => trees.push(tree),
            Err(errs) => errors.extend(errs),
        }
    }
    if errors.is_empty() {
        Ok(trees)
    } else {
        Err(errors)
    }
}

/// Drives extraction, naming and execution for one run.
///
/// The namer lives as long as the orchestrator, so names are unique across
/// every document of the run.
pub struct Orchestrator<E> {
    executor: E,
    options: ExtractOptions,
    namer: TestNamer,
    filter: Option<String>,
}

impl<E: Executor> Orchestrator<E> {
    pub fn new(executor: E, options: ExtractOptions) -> Self {
        Orchestrator {
            executor,
            options,
            namer: TestNamer::new(),
            filter: None,
        }
    }

    /// Only keep cases whose name contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Turn parsed documents into named suites, in document order.
    pub fn plan(&mut self, documents: &[Document], trees: &[Tree]) -> Vec<Suite> {
        let mut suites = Vec::with_capacity(documents.len());
        for (document, tree) in documents.iter().zip(trees) {
            let samples = extract(tree, &self.options);
            tracing::debug!(document = %document.name, samples = samples.len(), "extracted");

            let cases: Vec<Case> = if samples.is_empty() {
                vec![Case {
                    name: format!("{} has no code samples", document.name),
                    display_name: document.name.clone(),
                    sample: None,
                }]
            } else {
                samples
                    .into_iter()
                    .map(|sample| Case {
                        name: self.namer.next(&sample.chapter_title),
                        display_name: sample.display_name(&document.name),
                        sample: Some(sample),
                    })
                    .collect()
            };

            let cases: Vec<Case> = match &self.filter {
                Some(filter) => cases.into_iter().filter(|c| c.name.contains(filter.as_str())).collect(),
                None => cases,
            };
            if !cases.is_empty() {
                suites.push(Suite {
                    name: document.name.clone(),
                    cases,
                });
            }
        }
        suites
    }

    /// Execute every case. A failing sample never stops the others.
    pub fn run(&self, suites: &[Suite]) -> Vec<SuiteResult> {
        suites
            .iter()
            .map(|suite| SuiteResult {
                name: suite.name.clone(),
                results: suite.cases.iter().map(|case| self.run_case(case)).collect(),
            })
            .collect()
    }

    fn run_case(&self, case: &Case) -> TestResult {
        let outcome = match &case.sample {
            None => TestOutcome::Pass,
            Some(sample) => {
                let unit = sample.source_unit();
                match self.executor.execute(&unit, &case.display_name, sample.language) {
                    Verdict::Pass => TestOutcome::Pass,
                    Verdict::Fail(err) => TestOutcome::Fail(err.cause()),
                }
            }
        };
        TestResult {
            name: case.name.clone(),
            display_name: case.display_name.clone(),
            outcome,
        }
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

/// Print the test names `run` would execute, grouped by suite.
pub fn print_plan(suites: &[Suite]) {
    for suite in suites {
        println!("{}", suite.name);
        for case in &suite.cases {
            println!("  {}", case.name);
        }
    }
}

/// Print the report. Returns exit code: 0 = all pass, 1 = any failure.
pub fn print_report(results: &[SuiteResult], no_color: bool) -> i32 {
    let mut passed = 0usize;
    let mut failures: Vec<&TestResult> = Vec::new();

    for suite in results {
        eprintln!();
        eprintln!("{}", bold(&suite.name, no_color));
        for result in &suite.results {
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), result.name);
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), result.name);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ({}) ---", f.name, f.display_name);
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    let failed = failures.len();
    eprintln!();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let label = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            label,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use manuscript::sample::Language;
    use sandbox::ExecError;

    use super::*;

    /// Fails any unit containing `FAIL`, records what it was asked to run.
    #[derive(Default)]
    struct FakeExecutor {
        seen: RefCell<Vec<String>>,
    }

    impl Executor for FakeExecutor {
        fn execute(&self, unit: &str, display_name: &str, _language: Language) -> Verdict {
            self.seen.borrow_mut().push(display_name.to_string());
            if unit.contains("FAIL") {
                Verdict::Fail(ExecError::Runtime {
                    name: display_name.to_string(),
                    status: Some(1),
                    stderr: "Error: FAIL\n".to_string(),
                })
            } else {
                Verdict::Pass
            }
        }
    }

    fn book() -> Vec<Document> {
        vec![
            Document::new(
                "010_Setup.md",
                "# Setup\n\n```js\nok()\n```\n\n```ts\nFAIL\n```\n",
            ),
            Document::new("020_Prose.md", "# Prose\n\nNo code here.\n"),
            Document::new(
                "030_More.md",
                "# Setup\n\n```jsx\n<Ok />\n```\n\n```bash\nls\n```\n",
            ),
        ]
    }

    fn orchestrator() -> Orchestrator<FakeExecutor> {
        Orchestrator::new(FakeExecutor::default(), ExtractOptions::default())
    }

    #[test]
    fn names_are_unique_across_documents() {
        let docs = book();
        let trees = parse_all(&docs).unwrap();
        let suites = orchestrator().plan(&docs, &trees);

        let names: Vec<Vec<&str>> = suites
            .iter()
            .map(|s| s.cases.iter().map(|c| c.name.as_str()).collect())
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["Setup 1", "Setup 2"],
                vec!["020_Prose.md has no code samples"],
                vec!["Setup 3"],
            ]
        );
        assert_eq!(suites[0].name, "010_Setup.md");
        assert_eq!(suites[0].cases[1].display_name, "010_Setup.md.ts");
    }

    #[test]
    fn failure_does_not_stop_the_run() {
        let docs = book();
        let trees = parse_all(&docs).unwrap();
        let mut orchestrator = orchestrator();
        let suites = orchestrator.plan(&docs, &trees);
        let results = orchestrator.run(&suites);

        let outcomes: Vec<bool> = results
            .iter()
            .flat_map(|s| &s.results)
            .map(|r| matches!(r.outcome, TestOutcome::Pass))
            .collect();
        assert_eq!(outcomes, [true, false, true, true]);
        assert_eq!(
            *orchestrator.executor.seen.borrow(),
            ["010_Setup.md.js", "010_Setup.md.ts", "030_More.md.jsx"]
        );

        match &results[0].results[1].outcome {
            TestOutcome::Fail(reason) => assert_eq!(reason, "Error: FAIL"),
            TestOutcome::Pass => panic!("expected failure"),
        }
        assert_eq!(print_report(&results, true), 1);
    }

    #[test]
    fn passing_run_exits_zero() {
        let docs = vec![Document::new("a.md", "# A\n\n```js\nok()\n```\n")];
        let trees = parse_all(&docs).unwrap();
        let mut orchestrator = orchestrator();
        let suites = orchestrator.plan(&docs, &trees);
        assert_eq!(print_report(&orchestrator.run(&suites), true), 0);
    }

    #[test]
    fn filter_keeps_matching_cases() {
        let docs = book();
        let trees = parse_all(&docs).unwrap();
        let suites = orchestrator()
            .with_filter(Some("Setup 2".to_string()))
            .plan(&docs, &trees);
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].cases.len(), 1);
        assert_eq!(suites[0].cases[0].name, "Setup 2");
    }

    #[test]
    fn parse_errors_from_all_documents_are_collected() {
        let docs = vec![
            Document::new("a.md", "<!-- open\n"),
            Document::new("b.md", "# fine\n"),
            Document::new("c.md", "```js\nnever closed\n"),
        ];
        let errors = parse_all(&docs).unwrap_err();
        let ids: Vec<usize> = errors.iter().map(|e| e.file_id).collect();
        assert_eq!(ids, [0, 2]);
    }
}
