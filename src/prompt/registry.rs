//! Label transition registry.
//!
//! K_i: A transition is an ordered pair of distinct labels plus the prompt
//! that asks the model to move a hypothesis from one to the other.
//! I^R: Strictness and custom templates are chosen per transition in config.

use super::PromptTemplate;
use crate::models::{Config, ConfigError, EditStrictness, Label, Result};
use std::fmt;

/// One (from → to) perturbation with its prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTransition {
    from: Label,
    to: Label,
    strictness: EditStrictness,
    template: PromptTemplate,
}

impl LabelTransition {
    /// Transition using the built-in template for the given strictness.
    pub fn new(from: Label, to: Label, strictness: EditStrictness) -> Result<Self> {
        let template = PromptTemplate::new(builtin_template(from, to, strictness))?;
        Self::with_template(from, to, strictness, template)
    }

    /// Transition using a caller-supplied template.
    pub fn with_template(
        from: Label,
        to: Label,
        strictness: EditStrictness,
        template: PromptTemplate,
    ) -> Result<Self> {
        if from == to {
            return Err(ConfigError::InvalidTransition {
                from,
                to,
                reason: "original and new label must differ".to_string(),
            }
            .into());
        }
        Ok(Self {
            from,
            to,
            strictness,
            template,
        })
    }

    pub fn from(&self) -> Label {
        self.from
    }

    pub fn to(&self) -> Label {
        self.to
    }

    pub fn strictness(&self) -> EditStrictness {
        self.strictness
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Stable name, also the artifact file stem: `entailment_to_contradiction`.
    pub fn name(&self) -> String {
        format!("{}_to_{}", self.from, self.to)
    }

    /// Render this transition's prompt for one example.
    pub fn render(&self, premise: &str, hypothesis: &str) -> String {
        self.template.render(premise, hypothesis)
    }
}

impl fmt::Display for LabelTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.strictness)
    }
}

/// Ordered set of transitions for one run.
#[derive(Debug, Clone, Default)]
pub struct TransitionRegistry {
    transitions: Vec<LabelTransition>,
}

impl TransitionRegistry {
    /// Every ordered pair of distinct labels, with built-in templates.
    pub fn all(strictness: EditStrictness) -> Result<Self> {
        let mut transitions = Vec::with_capacity(6);
        for from in Label::ALL {
            for to in Label::ALL.into_iter().filter(|&to| to != from) {
                transitions.push(LabelTransition::new(from, to, strictness)?);
            }
        }
        Ok(Self { transitions })
    }

    /// Build the configured transitions, loading and validating every
    /// template eagerly so template errors surface before any call is made.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut transitions = Vec::with_capacity(config.transitions.len());
        for t in &config.transitions {
            let strictness = config.strictness_for(t);
            let transition = match &t.template {
                Some(path) => LabelTransition::with_template(
                    t.from,
                    t.to,
                    strictness,
                    PromptTemplate::from_file(path)?,
                )?,
                None => LabelTransition::new(t.from, t.to, strictness)?,
            };
            transitions.push(transition);
        }

        Ok(Self { transitions })
    }

    pub fn get(&self, from: Label, to: Label) -> Option<&LabelTransition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelTransition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// How the current relationship is described to the model.
fn current_relation(label: Label) -> &'static str {
    match label {
        Label::Entailment => "is entailed by",
        Label::Neutral => "is neutral with respect to",
        Label::Contradiction => "contradicts",
    }
}

/// The requested change.
fn target_relation(label: Label) -> &'static str {
    match label {
        Label::Entailment => "so that it is entailed by the premise",
        Label::Neutral => "so that the premise neither entails nor contradicts it",
        Label::Contradiction => "to contradict the premise",
    }
}

fn target_guidance(label: Label) -> &'static str {
    match label {
        Label::Entailment => "Ensure the modified hypothesis logically follows from the premise.",
        Label::Neutral => {
            "Ensure the modified hypothesis could be true or false given the premise."
        }
        Label::Contradiction => "Aim for plausible contradictions.",
    }
}

fn short_form(label: Label) -> &'static str {
    match label {
        Label::Entailment => "entailed",
        Label::Neutral => "neutral",
        Label::Contradiction => "contradicts",
    }
}

fn adjective(label: Label) -> &'static str {
    match label {
        Label::Entailment => "entailed",
        Label::Neutral => "neutral",
        Label::Contradiction => "contradicting",
    }
}

fn edit_instruction(strictness: EditStrictness) -> &'static str {
    match strictness {
        EditStrictness::Minimal => "while keeping the same basic topic and making minimal changes",
        EditStrictness::FreeForm => {
            "keeping it on the same topic as the premise; you may rewrite it freely"
        }
    }
}

/// Built-in template text for a transition.
pub fn builtin_template(from: Label, to: Label, strictness: EditStrictness) -> String {
    format!(
        "Given a premise and hypothesis pair where the hypothesis currently {current} the premise, \
         modify the hypothesis {target} {edit}. {guidance}\n\
         \n\
         Premise: {{premise}}\n\
         Original hypothesis ({short}): {{hypothesis}}\n\
         \n\
         Output only the new {adjective} hypothesis with no other text.\n",
        current = current_relation(from),
        target = target_relation(to),
        edit = edit_instruction(strictness),
        guidance = target_guidance(to),
        short = short_form(from),
        adjective = adjective(to),
    )
}
