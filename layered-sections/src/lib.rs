#![doc(
    html_logo_url = "https://raw.githubusercontent.com/storyscript/layered-nlp/main/assets/layered-nlp.svg",
    issue_tracker_base_url = "https://github.com/storyscript/layered-nlp/issues/"
)]

//! Section detection for layered-clinical.
//!
//! A [`Sectionizer`] matches header rules, keeps the non-overlapping
//! headers, and resolves each section's parent from the categories its rule
//! allows. The result is stored with [`LLDoc::set_sections`] as a flat list
//! whose `parent` fields index into the same list.
//!
//! [`Sectionizer::dated`] adds date headers: a date and time at the start of
//! a line opens a top-level section that every following section nests under
//! until the next one, and every section carries the date of its own title or
//! of its parent.
//!
//! ```ignore
//! let sectionizer = Sectionizer::new("sections", vec![
//!     SectionRule::new("plan", "plan"),
//!     SectionRule::new("medication", "medications").with_parents(["plan"], true),
//! ])?;
//! let doc = pipeline.process("Plan: review.\nMedications: none")?.run(&sectionizer)?;
//! ```
//!
//! [`LLDoc::set_sections`]: layered_clinical::LLDoc::set_sections

mod hierarchy;
mod rules;
mod sectionizer;

pub use rules::{SectionRule, DATE_CATEGORY};
pub use sectionizer::{date_section_rules, Sectionizer, SectionizerConfig, SECTION_DATE};

#[cfg(test)]
mod tests {
    mod sections;
}
