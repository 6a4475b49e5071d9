//! Prompt templates with `{premise}` and `{hypothesis}` slots.
//!
//! K_i: A template is validated once at construction; rendering is then
//! infallible and never drops a slot.

use crate::models::TemplateError;
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

pub const PREMISE_SLOT: &str = "premise";
pub const HYPOTHESIS_SLOT: &str = "hypothesis";

static SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(premise|hypothesis)\}").expect("slot pattern is valid"));

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Validate that both slots are present.
    pub fn new(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        for slot in [PREMISE_SLOT, HYPOTHESIS_SLOT] {
            if !text.contains(&format!("{{{slot}}}")) {
                return Err(TemplateError::MissingSlot { slot });
            }
        }
        Ok(Self { text })
    }

    /// Load and validate a template file.
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|e| TemplateError::Read {
            path: path.to_owned(),
            source: e,
        })?;
        Self::new(text)
    }

    /// Substitute both slots in a single pass.
    ///
    /// Inserted text is never rescanned, so a premise containing
    /// `{hypothesis}` stays literal.
    pub fn render(&self, premise: &str, hypothesis: &str) -> String {
        SLOT_RE
            .replace_all(&self.text, |caps: &Captures| match &caps[1] {
                PREMISE_SLOT => premise.to_string(),
                _ => hypothesis.to_string(),
            })
            .into_owned()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Render a raw template string, validating it first.
pub fn render(template: &str, premise: &str, hypothesis: &str) -> Result<String, TemplateError> {
    Ok(PromptTemplate::new(template)?.render(premise, hypothesis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_embeds_both_strings_verbatim() {
        let out = render(
            "P: {premise}\nH: {hypothesis}\n",
            "A \"quoted\" <premise> & more",
            "Ünïcödé hypothesis\n",
        )
        .unwrap();
        assert_eq!(out, "P: A \"quoted\" <premise> & more\nH: Ünïcödé hypothesis\n\n");
    }

    #[test]
    fn test_missing_slot_is_rejected() {
        let err = PromptTemplate::new("Premise: {premise}").unwrap_err();
        assert!(matches!(err, TemplateError::MissingSlot { slot: "hypothesis" }));

        let err = PromptTemplate::new("Hypothesis: {hypothesis}").unwrap_err();
        assert!(matches!(err, TemplateError::MissingSlot { slot: "premise" }));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let template = PromptTemplate::new("{premise} | {hypothesis}").unwrap();
        let out = template.render("{hypothesis}", "$1 {premise}");
        assert_eq!(out, "{hypothesis} | $1 {premise}");
    }

    #[test]
    fn test_repeated_slots_all_filled() {
        let template = PromptTemplate::new("{premise} {premise} {hypothesis}").unwrap();
        assert_eq!(template.render("a", "b"), "a a b");
    }

    #[test]
    fn test_other_braces_left_alone() {
        let template = PromptTemplate::new("{premise} {other} {hypothesis} {}").unwrap();
        assert_eq!(template.render("a", "b"), "a {other} b {}");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = PromptTemplate::from_file(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }
}
