//! Registry of worker types, indexed by name.
//!
//! The runner resolves its worker argument here. Only `WorkStep`
//! implementations can be registered, so a resolved name always names a
//! worker; an unknown name is rejected before anything is built.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::worker::WorkStep;
use crate::workers::{CommandWorker, CommandWorkerDef, EchoWorker};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Builds a fresh worker from the process configuration.
pub type WorkerFactory = Box<dyn Fn(&Config) -> Result<Box<dyn WorkStep>> + Send + Sync>;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct WorkerFile {
    worker: CommandWorkerDef,
}

pub struct WorkerRegistry {
    factories: BTreeMap<String, WorkerFactory>,
}

impl WorkerRegistry {
    /// Create an empty registry with no workers.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The workers shipped with the crate: `echo`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.factories.insert(
            "echo".to_string(),
            Box::new(|config: &Config| -> Result<Box<dyn WorkStep>> {
                Ok(Box::new(EchoWorker::new(config.worker_tube.clone())))
            }),
        );
        registry
    }

    /// Register a worker type under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&Config) -> Result<Box<dyn WorkStep>> + Send + Sync + 'static,
    {
        validate_name(name)?;
        if self.factories.contains_key(name) {
            return Err(Error::InvalidConfiguration(format!(
                "worker {name:?} is already registered"
            )));
        }
        self.factories.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    /// Load every `.toml` file in `dir` as a command worker definition.
    /// Returns the number of workers added.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("cannot read worker dir {}: {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let content = std::fs::read_to_string(path)?;
            let file: WorkerFile = toml::from_str(&content).map_err(|e| {
                Error::Config(format!("bad worker definition {}: {e}", path.display()))
            })?;
            let def = file.worker;
            let name = def.name.clone();
            debug!(worker = %name, path = %path.display(), "loaded worker definition");
            self.register(&name, move |_config: &Config| {
                Ok(Box::new(CommandWorker::new(def.clone())) as Box<dyn WorkStep>)
            })?;
        }

        Ok(paths.len())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&WorkerFactory> {
        self.factories.get(name)
    }

    /// Look up `name`, failing with `InvalidConfiguration` when it is not a
    /// registered worker.
    pub fn resolve(&self, name: &str) -> Result<&WorkerFactory> {
        self.get(name).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "worker {name:?} is not a registered worker type"
            ))
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Worker names end up in log file names.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration(format!(
            "invalid worker name {name:?}: use letters, digits, '-' and '_'"
        )))
    }
}
