#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Declarative engine configuration for layered-clinical.
//!
//! An engine config is a YAML map of named components, each naming a
//! factory and its config. Configs can `include` other configs, whose
//! components override the including file's. Before parsing, every
//! `${name}` placeholder is replaced with the JSON of a named constant
//! (`months`, `year_regex`, ...) or of a key of a pattern file
//! (`${patterns.ecog.token}` reads `token` from `<pattern_root>/ecog.json`).
//!
//! ```ignore
//! let mut loader = ConfigLoader::new("resources/patterns");
//! let config = loader.load_engine_config("resources/engine.yaml")?;
//! let pipeline = build_pipeline(&config, &["normalizer", "ecog", "context"])?;
//! let doc = pipeline.process("ECOG PS 1, no PEG")?;
//! ```

mod errors;
mod factory;
mod interpolate;
mod loader;

pub use errors::{ConfigError, ConfigResult};
pub use factory::{build_component, build_pipeline, Factory};
pub use interpolate::{interpolate, placeholders};
pub use loader::{ComponentSpec, ConfigLoader, EngineConfig};

#[cfg(test)]
mod tests {
    mod loading;
}
