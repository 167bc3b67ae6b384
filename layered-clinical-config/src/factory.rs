//! Component factories: from a `ComponentSpec` to a compiled component.

use std::fs;
use std::str::FromStr;

use layered_clinical::{Component, PatternError, Pipeline};
use layered_context::{ContextComponent, ContextComponentConfig, ContextRules};
use layered_extract::{
    LabelMatcher, LabelMatcherConfig, Normalizer, NormalizerConfig, RuleEngine, RuleEngineConfig,
    ValueExtractor, ValueExtractorConfig,
};
use layered_sections::{Sectionizer, SectionizerConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ComponentSpec, ConfigError, ConfigResult, EngineConfig};

/// The component kinds an engine config can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factory {
    LabelMatcher,
    ValueExtractor,
    RuleEngine,
    Normalizer,
    Context,
    Sectionizer,
    DatedSectionizer,
}

impl FromStr for Factory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "label_matcher" => Factory::LabelMatcher,
            "value_extractor" => Factory::ValueExtractor,
            "rule_engine" => Factory::RuleEngine,
            "normalizer" | "normaliser" => Factory::Normalizer,
            "context" => Factory::Context,
            "sectionizer" => Factory::Sectionizer,
            "dated_sectionizer" => Factory::DatedSectionizer,
            other => return Err(other.to_string()),
        })
    }
}

fn parse_config<T: DeserializeOwned>(spec: &ComponentSpec) -> ConfigResult<T> {
    // a missing `config:` reads as an empty map
    let config = match &spec.config {
        Value::Null => Value::Object(Default::default()),
        config => config.clone(),
    };
    serde_json::from_value(config).map_err(|err| ConfigError::Schema {
        path: spec.source.clone(),
        message: err.to_string(),
    })
}

fn compiled<C>(name: &str, built: Result<C, PatternError>) -> ConfigResult<Box<dyn Component>>
where
    C: Component + 'static,
{
    built.map(|c| Box::new(c) as Box<dyn Component>).map_err(|source| ConfigError::Pattern {
        component: name.to_string(),
        source,
    })
}

/// Context config whose `rules` is a path to a rules file or the rules inline.
fn context_config(spec: &ComponentSpec) -> ConfigResult<ContextComponentConfig> {
    let mut config = match &spec.config {
        Value::Object(map) => map.clone(),
        _ => Default::default(),
    };
    let (rules, path) = match config.remove("rules") {
        Some(Value::String(file)) => {
            let path = spec.resolve_path(&file);
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let value = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
                path: path.clone(),
                message: err.to_string(),
            })?;
            (value, path)
        }
        Some(inline) => (inline, spec.source.clone()),
        None => (Value::Object(Default::default()), spec.source.clone()),
    };

    let mut parsed: ContextComponentConfig = parse_config(&ComponentSpec {
        config: Value::Object(config),
        ..spec.clone()
    })?;
    if !rules.as_object().map_or(false, |map| map.is_empty()) {
        let rules = ContextRules::from_json(&rules).map_err(|err| ConfigError::Schema {
            path,
            message: err.to_string(),
        })?;
        parsed.context_rules.extend(rules.context_rules);
    }
    Ok(parsed)
}

/// Compile the component `name` described by `spec`.
pub fn build_component(name: &str, spec: &ComponentSpec) -> ConfigResult<Box<dyn Component>> {
    let factory = Factory::from_str(&spec.factory).map_err(|factory| ConfigError::UnknownFactory {
        component: name.to_string(),
        factory,
    })?;
    tracing::debug!(component = name, factory = ?factory, "building component");

    match factory {
        Factory::LabelMatcher => {
            let config: LabelMatcherConfig = parse_config(spec)?;
            compiled(name, LabelMatcher::from_config(name, &config))
        }
        Factory::ValueExtractor => {
            let config: ValueExtractorConfig = parse_config(spec)?;
            compiled(name, ValueExtractor::from_config(name, &config))
        }
        Factory::RuleEngine => {
            let config: RuleEngineConfig = parse_config(spec)?;
            compiled(name, RuleEngine::from_config(name, &config))
        }
        Factory::Normalizer => {
            let config: NormalizerConfig = parse_config(spec)?;
            compiled(name, Normalizer::from_config(name, &config))
        }
        Factory::Context => {
            let config = context_config(spec)?;
            compiled(name, ContextComponent::from_config(name, &config))
        }
        Factory::Sectionizer => {
            let config: SectionizerConfig = parse_config(spec)?;
            compiled(name, Sectionizer::from_config(name, &config))
        }
        Factory::DatedSectionizer => {
            let config: SectionizerConfig = parse_config(spec)?;
            compiled(name, Sectionizer::dated_from_config(name, &config))
        }
    }
}

/// Build an immutable pipeline of the named components, in the given order.
///
/// Every name is looked up and every component compiled before the pipeline
/// exists; the pipeline then checks that each extension a component reads
/// is declared by some component.
pub fn build_pipeline(config: &EngineConfig, names: &[&str]) -> ConfigResult<Pipeline> {
    let mut builder = Pipeline::builder();
    for name in names {
        let spec = config.get(name).ok_or_else(|| ConfigError::UnknownComponent {
            name: name.to_string(),
        })?;
        builder = builder.add_boxed(build_component(name, spec)?);
    }
    Ok(builder.build()?)
}
