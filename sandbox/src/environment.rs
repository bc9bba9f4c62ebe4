use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// How an injected global gets its value.
///
/// Globals are resolved lazily on first access, so a sample that never
/// touches `React` does not need react installed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Global {
    /// `require(module)`.
    Module(String),
    /// `require(module)[export]`.
    Export { module: String, export: String },
    /// An arbitrary JavaScript expression.
    Expr { expr: String },
}

impl Global {
    pub fn export(module: &str, export: &str) -> Self {
        Global::Export {
            module: module.to_string(),
            export: export.to_string(),
        }
    }
}

/// The bindings every sample is run with. Built once per run and shared
/// read-only by all sample contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Name → binding installed on `globalThis`.
    pub globals: BTreeMap<String, Global>,
    /// Module name → JavaScript expression returned instead of the real module.
    pub mocks: BTreeMap<String, String>,
    /// Statements run after each sample, even when it failed.
    pub teardown: Vec<String>,
    /// Directory whose `node_modules` resolves real imports.
    pub module_root: PathBuf,
}

impl Environment {
    /// An environment with no globals, mocks or teardown.
    pub fn bare(module_root: impl Into<PathBuf>) -> Self {
        Environment {
            globals: BTreeMap::new(),
            mocks: BTreeMap::new(),
            teardown: Vec::new(),
            module_root: module_root.into(),
        }
    }

    /// The bindings the book's samples are written against.
    pub fn book_defaults(module_root: impl Into<PathBuf>) -> Self {
        let globals = [
            ("_", Global::Module("lodash".into())),
            ("path", Global::Module("path".into())),
            ("React", Global::Module("react".into())),
            ("useState", Global::export("react", "useState")),
            ("useReducer", Global::export("react", "useReducer")),
            ("RTL", Global::Module("@testing-library/react".into())),
            (
                "Button",
                Global::Expr {
                    expr: "(...props) => React.createElement('button', props)".into(),
                },
            ),
            (
                "Text",
                Global::Expr {
                    expr: "(...props) => React.createElement('p', props)".into(),
                },
            ),
        ];

        let identity = "(x) => x";
        let config_stub = "{ config(x) { return x; }, configs: { recommended: [] } }";
        let mocks = [
            ("fs", "{ readFileSync: (x) => x }"),
            ("./readme", identity),
            ("fs-extra", identity),
            ("glob", identity),
            ("user-home", identity),
            ("express", "{ Router: () => ({ use: () => {}, get: () => {} }) }"),
            ("@eslint/js", config_stub),
            ("typescript-eslint", config_stub),
        ];

        Environment {
            globals: globals
                .into_iter()
                .map(|(name, global)| (name.to_string(), global))
                .collect(),
            mocks: mocks
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr.to_string()))
                .collect(),
            teardown: vec!["if (__folio.loaded.has('RTL')) RTL.cleanup();".to_string()],
            module_root: module_root.into(),
        }
    }

    pub fn with_global(mut self, name: impl Into<String>, global: Global) -> Self {
        self.globals.insert(name.into(), global);
        self
    }

    pub fn with_mock(mut self, module: impl Into<String>, expr: impl Into<String>) -> Self {
        self.mocks.insert(module.into(), expr.into());
        self
    }

    pub fn with_teardown(mut self, statement: impl Into<String>) -> Self {
        self.teardown.push(statement.into());
        self
    }

    /// The bootstrap script every sample is loaded after.
    pub fn prelude(&self) -> String {
        crate::prelude::render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mock_io_modules() {
        let env = Environment::book_defaults(".");
        assert!(env.mocks.contains_key("fs"));
        assert!(env.mocks.contains_key("express"));
        assert!(!env.mocks.contains_key("lodash"));
        assert_eq!(env.globals["useState"], Global::export("react", "useState"));
    }

    #[test]
    fn builders_override_defaults() {
        let env = Environment::book_defaults(".")
            .with_mock("fs", "{ readFileSync: () => 'stub' }")
            .with_global("answer", Global::Expr { expr: "42".into() });
        assert_eq!(env.mocks["fs"], "{ readFileSync: () => 'stub' }");
        assert!(env.globals.contains_key("answer"));
    }

    #[test]
    fn globals_deserialize_from_toml_shapes() {
        #[derive(Deserialize)]
        struct Table {
            globals: BTreeMap<String, Global>,
        }
        let table: Table = toml::from_str(
            r#"
            [globals]
            _ = "lodash"
            useState = { module = "react", export = "useState" }
            answer = { expr = "42" }
            "#,
        )
        .unwrap();
        assert_eq!(table.globals["_"], Global::Module("lodash".into()));
        assert_eq!(table.globals["useState"], Global::export("react", "useState"));
        assert_eq!(table.globals["answer"], Global::Expr { expr: "42".into() });
    }
}
