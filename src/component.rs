//! Components and the pipeline that runs them.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{create_doc_with_schema, DocError, ExtensionDecl, ExtensionSchema, LLDoc};

/// A document-processing step.
///
/// Components are compiled once and only read their own state while
/// processing, so one instance can serve many documents across threads.
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    /// Extension slots this component writes.
    fn extensions(&self) -> Vec<ExtensionDecl> {
        Vec::new()
    }

    /// Extension slots this component reads; they must be declared by some
    /// component of the same pipeline.
    fn extension_refs(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError>;
}

/// An ordered, immutable list of components sharing one extension schema.
pub struct Pipeline {
    schema: Arc<ExtensionSchema>,
    components: Vec<Box<dyn Component>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("components", &self.component_names())
            .field("extensions", &self.schema.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn schema(&self) -> &Arc<ExtensionSchema> {
        &self.schema
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Tokenize `text` into a document carrying this pipeline's schema.
    pub fn make_doc(&self, text: &str) -> LLDoc {
        create_doc_with_schema(text, self.schema.clone())
    }

    /// Single-sentence document of the given words, carrying this pipeline's schema.
    pub fn doc_from_words(&self, words: &[&str]) -> LLDoc {
        LLDoc::from_words(self.schema.clone(), words)
    }

    /// Tokenize and run every component.
    pub fn process(&self, text: &str) -> Result<LLDoc, DocError> {
        let mut doc = self.make_doc(text);
        self.apply(&mut doc)?;
        Ok(doc)
    }
}

impl Component for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn extensions(&self) -> Vec<ExtensionDecl> {
        self.components.iter().flat_map(|c| c.extensions()).collect()
    }

    fn extension_refs(&self) -> BTreeSet<String> {
        self.components
            .iter()
            .flat_map(|c| c.extension_refs())
            .collect()
    }

    fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
        for component in &self.components {
            tracing::debug!(
                component = component.name(),
                tokens = doc.len(),
                "applying component"
            );
            component.apply(doc)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    components: Vec<Box<dyn Component>>,
    declarations: Vec<ExtensionDecl>,
}

impl PipelineBuilder {
    pub fn add(self, component: impl Component + 'static) -> Self {
        self.add_boxed(Box::new(component))
    }

    pub fn add_boxed(mut self, component: Box<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Declare a slot no component writes, e.g. one filled by the caller.
    pub fn declare(mut self, decl: ExtensionDecl) -> Self {
        self.declarations.push(decl);
        self
    }

    /// Fold every declaration into one schema and check every read against it.
    pub fn build(self) -> Result<Pipeline, DocError> {
        let mut schema = ExtensionSchema::builder();
        schema.declare_all(self.declarations)?;
        for component in &self.components {
            schema.declare_all(component.extensions())?;
        }
        let schema = schema.build();

        for component in &self.components {
            if let Some(name) = component
                .extension_refs()
                .into_iter()
                .find(|name| !schema.contains(name))
            {
                return Err(DocError::UnresolvedExtension {
                    component: component.name().to_string(),
                    name,
                });
            }
        }

        tracing::debug!(
            components = self.components.len(),
            extensions = schema.len(),
            schema_version = schema.version(),
            "built pipeline"
        );
        Ok(Pipeline {
            schema: Arc::new(schema),
            components: self.components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExtValue, SpanRef};

    struct FlagDigits;

    impl Component for FlagDigits {
        fn name(&self) -> &str {
            "flag_digits"
        }

        fn extensions(&self) -> Vec<ExtensionDecl> {
            vec![ExtensionDecl::flag("digit")]
        }

        fn apply(&self, doc: &mut LLDoc) -> Result<(), DocError> {
            for idx in 0..doc.len() {
                if doc.tokens()[idx].flags().is_digit {
                    doc.set_ext(idx, "digit", ExtValue::Bool(true))?;
                }
            }
            Ok(())
        }
    }

    struct ReadsDates;

    impl Component for ReadsDates {
        fn name(&self) -> &str {
            "reads_dates"
        }

        fn extension_refs(&self) -> BTreeSet<String> {
            ["date".to_string()].into_iter().collect()
        }

        fn apply(&self, _doc: &mut LLDoc) -> Result<(), DocError> {
            Ok(())
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn pipelines_are_shareable() {
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn pipeline_declares_and_applies() {
        let pipeline = Pipeline::builder().add(FlagDigits).build().unwrap();
        let doc = pipeline.process("ECOG 2").unwrap();

        assert_eq!(doc.ext(1, "digit").unwrap(), &ExtValue::Bool(true));
        assert_eq!(doc.ext(0, "digit").unwrap(), &ExtValue::Bool(false));
        assert_eq!(pipeline.component_names(), vec!["flag_digits"]);
    }

    #[test]
    fn undeclared_reads_fail_the_build() {
        let err = Pipeline::builder()
            .add(FlagDigits)
            .add(ReadsDates)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DocError::UnresolvedExtension {
                component: "reads_dates".to_string(),
                name: "date".to_string(),
            }
        );

        let ok = Pipeline::builder()
            .declare(ExtensionDecl::flag("date"))
            .add(ReadsDates)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn run_chains_components() {
        let pipeline = Pipeline::builder().add(FlagDigits).build().unwrap();
        let doc = pipeline.doc_from_words(&["weight", "70"]).run(&pipeline).unwrap();
        assert_eq!(doc.text_of(SpanRef::new(1, 2)), "70");
        assert_eq!(doc.ext(1, "digit").unwrap(), &ExtValue::Bool(true));
    }
}
