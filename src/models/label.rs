//! NLI labels and their canonical numeric codes.
//!
//! K_i: Exactly three labels exist; the numeric codes follow SNLI/MNLI
//! (entailment=0, neutral=1, contradiction=2).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel code for symbolic labels outside the canonical table.
pub const UNMAPPED_LABEL: i64 = -1;

/// Relationship between a premise and a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Entailment,
    Neutral,
    Contradiction,
}

impl Label {
    /// All labels in code order.
    pub const ALL: [Label; 3] = [Label::Entailment, Label::Neutral, Label::Contradiction];

    /// Canonical numeric code.
    pub fn code(self) -> i64 {
        match self {
            Label::Entailment => 0,
            Label::Neutral => 1,
            Label::Contradiction => 2,
        }
    }

    /// Inverse of [`Label::code`]. Returns `None` for anything outside 0..=2.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Label::Entailment),
            1 => Some(Label::Neutral),
            2 => Some(Label::Contradiction),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Entailment => "entailment",
            Label::Neutral => "neutral",
            Label::Contradiction => "contradiction",
        }
    }
}

/// Map a symbolic label to its numeric code, or [`UNMAPPED_LABEL`].
///
/// Matching is exact: `"Entailment"` is not a canonical label.
pub fn label_code(symbol: &str) -> i64 {
    symbol
        .parse::<Label>()
        .map(Label::code)
        .unwrap_or(UNMAPPED_LABEL)
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown label name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label '{0}' (expected entailment, neutral or contradiction)")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entailment" => Ok(Label::Entailment),
            "neutral" => Ok(Label::Neutral),
            "contradiction" => Ok(Label::Contradiction),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_canonical_table() {
        assert_eq!(Label::Entailment.code(), 0);
        assert_eq!(Label::Neutral.code(), 1);
        assert_eq!(Label::Contradiction.code(), 2);
        for label in Label::ALL {
            assert_eq!(Label::from_code(label.code()), Some(label));
        }
        assert_eq!(Label::from_code(-1), None);
        assert_eq!(Label::from_code(3), None);
    }

    #[test]
    fn test_label_code_is_exact_match() {
        assert_eq!(label_code("entailment"), 0);
        assert_eq!(label_code("neutral"), 1);
        assert_eq!(label_code("contradiction"), 2);
        assert_eq!(label_code("Entailment"), UNMAPPED_LABEL);
        assert_eq!(label_code("entails"), UNMAPPED_LABEL);
        assert_eq!(label_code(""), UNMAPPED_LABEL);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Label::Contradiction).unwrap();
        assert_eq!(json, "\"contradiction\"");
        let parsed: Label = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(parsed, Label::Neutral);
    }
}
