//! Engine config and pattern file loading.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::interpolate::{interpolate, placeholders};
use crate::{ConfigError, ConfigResult};

/// One entry of an engine config's `components` map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentSpec {
    pub factory: String,
    #[serde(default)]
    pub config: Value,
    /// File the entry was read from; relative paths in `config` resolve against it.
    #[serde(skip)]
    pub source: PathBuf,
}

impl ComponentSpec {
    pub fn new(factory: impl Into<String>, config: Value) -> Self {
        Self {
            factory: factory.into(),
            config,
            source: PathBuf::new(),
        }
    }

    /// `path` resolved against the directory of the file this entry came from.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        match self.source.parent() {
            Some(dir) => dir.join(path),
            None => PathBuf::from(path),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEngineConfig {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    components: BTreeMap<String, ComponentSpec>,
}

/// Named component specifications gathered from an engine config and its includes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub components: BTreeMap<String, ComponentSpec>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, name: impl Into<String>, spec: ComponentSpec) -> Self {
        self.components.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Entries of `other` replace entries of the same name.
    pub fn merge(&mut self, other: EngineConfig) {
        self.components.extend(other.components);
    }
}

/// Loads engine configs, resolving `${...}` placeholders against named
/// constants and pattern files under `pattern_root`.
///
/// Pattern files are cached for the loader's lifetime.
#[derive(Debug)]
pub struct ConfigLoader {
    pattern_root: PathBuf,
    constants: BTreeMap<String, Value>,
    pattern_files: HashMap<String, Value>,
    /// Files being loaded, innermost last.
    loading: Vec<PathBuf>,
}

impl ConfigLoader {
    /// A loader with the normalisers' constants (`months`, `year_regex`, ...).
    pub fn new(pattern_root: impl Into<PathBuf>) -> Self {
        let constants = layered_extract::pattern_constants()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Self {
            pattern_root: pattern_root.into(),
            constants,
            pattern_files: HashMap::new(),
            loading: Vec::new(),
        }
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn pattern_root(&self) -> &Path {
        &self.pattern_root
    }

    /// Load an engine config, merging its includes.
    ///
    /// Includes resolve relative to the including file and are merged in
    /// order; each one overrides components of the same name.
    pub fn load_engine_config(&mut self, path: impl AsRef<Path>) -> ConfigResult<EngineConfig> {
        let path = path.as_ref().to_path_buf();
        self.enter(&path)?;
        let loaded = self.load_engine_config_inner(&path);
        self.loading.pop();
        let config = loaded?;
        tracing::info!(
            path = %path.display(),
            components = config.components.len(),
            "loaded engine config"
        );
        Ok(config)
    }

    fn load_engine_config_inner(&mut self, path: &Path) -> ConfigResult<EngineConfig> {
        let raw = read(path)?;
        let expanded = interpolate(&raw, |name| self.resolve(name, path))?;
        let parsed: RawEngineConfig = if expanded.trim().is_empty() {
            RawEngineConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
        };

        let mut config = EngineConfig {
            components: parsed
                .components
                .into_iter()
                .map(|(name, mut spec)| {
                    spec.source = path.to_path_buf();
                    (name, spec)
                })
                .collect(),
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        for include in &parsed.include {
            let included = self.load_engine_config(base_dir.join(include))?;
            config.merge(included);
        }
        Ok(config)
    }

    /// A pattern file `<pattern_root>/<file>.json`, interpolated.
    pub fn load_pattern_file(&mut self, file: &str) -> ConfigResult<Value> {
        if let Some(cached) = self.pattern_files.get(file) {
            return Ok(cached.clone());
        }

        let path = self.pattern_root.join(format!("{}.json", file));
        self.enter(&path)?;
        let loaded = self.load_pattern_file_inner(&path);
        self.loading.pop();
        let value = loaded?;

        tracing::debug!(path = %path.display(), "loaded pattern file");
        self.pattern_files.insert(file.to_string(), value.clone());
        Ok(value)
    }

    fn load_pattern_file_inner(&mut self, path: &Path) -> ConfigResult<Value> {
        let raw = read(path)?;
        tracing::trace!(path = %path.display(), placeholders = placeholders(&raw).len(), "interpolating");
        let expanded = interpolate(&raw, |name| self.resolve(name, path))?;
        let value: Value = serde_json::from_str(&expanded).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let patterns = value.as_object().ok_or_else(|| ConfigError::Schema {
            path: path.to_path_buf(),
            message: "pattern files must be JSON objects keyed by pattern name".to_string(),
        })?;
        for (key, entry) in patterns {
            if !is_token_pattern_list(entry) {
                return Err(ConfigError::Schema {
                    path: path.to_path_buf(),
                    message: format!("'{}' must be a list of token patterns, each a list of objects", key),
                });
            }
        }
        Ok(value)
    }

    /// Resolve a placeholder found in the file at `path`: a constant, or
    /// `patterns.<file>.<key>`.
    pub fn resolve(&mut self, name: &str, path: &Path) -> ConfigResult<Value> {
        if let Some(value) = self.constants.get(name) {
            return Ok(value.clone());
        }
        if name.starts_with("patterns.") {
            let parts: Vec<&str> = name.split('.').collect();
            let (file, key) = match parts.as_slice() {
                [_, file, key] => (*file, *key),
                _ => {
                    return Err(ConfigError::InvalidReference {
                        name: name.to_string(),
                    })
                }
            };
            let patterns = self.load_pattern_file(file)?;
            return patterns
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::UnresolvedPlaceholder {
                    name: name.to_string(),
                    path: self.pattern_root.join(format!("{}.json", file)),
                });
        }
        Err(ConfigError::UnresolvedPlaceholder {
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    fn enter(&mut self, path: &Path) -> ConfigResult<()> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.loading.contains(&key) {
            return Err(ConfigError::IncludeCycle { path: key });
        }
        self.loading.push(key);
        Ok(())
    }
}

/// `[[{...}, ...], ...]`
fn is_token_pattern_list(value: &Value) -> bool {
    value.as_array().map_or(false, |patterns| {
        patterns.iter().all(|pattern| {
            pattern
                .as_array()
                .map_or(false, |steps| steps.iter().all(Value::is_object))
        })
    })
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
