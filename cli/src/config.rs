use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use manuscript::sample::{ExtractOptions, Language};
use sandbox::{Environment, Global, Transpiler};

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "folio.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Book configuration (`folio.toml`). Every field has a default, so an
/// absent file is the same as an empty one.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the manuscript's Markdown files.
    pub manuscript: PathBuf,

    /// File names the link linter skips.
    pub lint_ignore: Vec<String>,

    pub samples: SamplesConfig,
    pub runtime: RuntimeConfig,

    /// Language tag → transpiler argv. An empty argv runs the language
    /// untranspiled.
    pub transpile: BTreeMap<String, Vec<String>>,

    /// Start from the book's default globals, mocks and teardown.
    pub book_defaults: bool,

    /// Merged over the defaults; a same-named entry replaces the default.
    pub globals: BTreeMap<String, Global>,
    pub mocks: BTreeMap<String, String>,

    /// Replaces the default teardown statements when set.
    pub teardown: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manuscript: PathBuf::from("manuscript"),
            lint_ignore: vec!["160_Footer.md".to_string()],
            samples: SamplesConfig::default(),
            runtime: RuntimeConfig::default(),
            transpile: BTreeMap::new(),
            book_defaults: true,
            globals: BTreeMap::new(),
            mocks: BTreeMap::new(),
            teardown: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplesConfig {
    pub languages: Vec<String>,
    pub ignore: Vec<String>,
    pub skip_marker: String,
}

impl Default for SamplesConfig {
    fn default() -> Self {
        let options = ExtractOptions::default();
        SamplesConfig {
            languages: options.languages.iter().map(|l| l.tag().to_string()).collect(),
            ignore: options.ignore,
            skip_marker: options.skip_marker,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Node.js binary, looked up on `PATH`.
    pub node: String,
    /// Where `node_modules` lives. Defaults to the working directory.
    pub module_root: Option<PathBuf>,
    pub timeout_secs: f64,
    /// Program used by the default transpiler commands.
    pub esbuild: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            node: "node".to_string(),
            module_root: None,
            timeout_secs: 10.0,
            esbuild: "esbuild".to_string(),
        }
    }
}

impl Config {
    /// Load `path`, or `folio.toml` in the working directory. Only an
    /// explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            tracing::debug!("no {} found, using defaults", CONFIG_FILE);
            return Ok(Config::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Config::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn extract_options(&self) -> Result<ExtractOptions, ConfigError> {
        let languages = self
            .samples
            .languages
            .iter()
            .map(|tag| tag.parse::<Language>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::Invalid)?;
        Ok(ExtractOptions {
            languages,
            ignore: self.samples.ignore.clone(),
            skip_marker: self.samples.skip_marker.clone(),
        })
    }

    pub fn environment(&self) -> Environment {
        let module_root = self
            .runtime
            .module_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        // Samples run from a temporary directory.
        let module_root = std::path::absolute(&module_root).unwrap_or(module_root);
        let mut env = if self.book_defaults {
            Environment::book_defaults(module_root)
        } else {
            Environment::bare(module_root)
        };

        for (name, global) in &self.globals {
            env = env.with_global(name.clone(), global.clone());
        }
        for (module, expr) in &self.mocks {
            env = env.with_mock(module.clone(), expr.clone());
        }
        if let Some(teardown) = &self.teardown {
            env.teardown = teardown.clone();
        }
        env
    }

    pub fn transpiler(&self) -> Result<Transpiler, ConfigError> {
        let mut transpiler = Transpiler::esbuild(&self.runtime.esbuild);
        for (tag, argv) in &self.transpile {
            let language = tag.parse::<Language>().map_err(ConfigError::Invalid)?;
            transpiler = transpiler.with_command(language, argv.clone());
        }
        Ok(transpiler)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.runtime.timeout_secs).map_err(|_| {
            ConfigError::Invalid(format!(
                "runtime.timeout_secs must be a positive number, got {}",
                self.runtime.timeout_secs
            ))
        })
    }
}
