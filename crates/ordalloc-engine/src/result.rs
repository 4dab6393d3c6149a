use serde::{Deserialize, Serialize};
use std::fmt;

use ordalloc_ir::Labels;

use crate::counterexample::Counterexample;

/// The four checked properties, in the order reports are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    ExPostEfficiency,
    OrdinalEfficiency,
    NoEnvy,
    StrategyProofness,
}

impl Property {
    pub const ALL: [Property; 4] = [
        Property::ExPostEfficiency,
        Property::OrdinalEfficiency,
        Property::NoEnvy,
        Property::StrategyProofness,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Property::ExPostEfficiency => "Ex-post efficiency",
            Property::OrdinalEfficiency => "Ordinal efficiency",
            Property::NoEnvy => "No envy",
            Property::StrategyProofness => "Strategy-proofness",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Holds,
    Fails { counterexample: Counterexample },
    /// The check could not finish, e.g. because its search budget ran out.
    /// This never means the property holds.
    Undetermined { reason: String },
}

/// Outcome of checking one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub property: Property,
    pub verdict: Verdict,
    /// Scope of the check when it was not exhaustive, or how it was decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VerificationReport {
    pub fn holds(property: Property) -> Self {
        Self {
            property,
            verdict: Verdict::Holds,
            note: None,
        }
    }

    pub fn fails(property: Property, counterexample: Counterexample) -> Self {
        Self {
            property,
            verdict: Verdict::Fails { counterexample },
            note: None,
        }
    }

    pub fn undetermined(property: Property, reason: impl Into<String>) -> Self {
        Self {
            property,
            verdict: Verdict::Undetermined {
                reason: reason.into(),
            },
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_holds(&self) -> bool {
        matches!(self.verdict, Verdict::Holds)
    }

    pub fn is_fails(&self) -> bool {
        matches!(self.verdict, Verdict::Fails { .. })
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match &self.verdict {
            Verdict::Fails { counterexample } => Some(counterexample),
            _ => None,
        }
    }

    /// Machine-readable verdict class: `holds`, `fails` or `undetermined`.
    pub fn verdict_class(&self) -> &'static str {
        match self.verdict {
            Verdict::Holds => "holds",
            Verdict::Fails { .. } => "fails",
            Verdict::Undetermined { .. } => "undetermined",
        }
    }

    /// One-line summary using the names in `labels`.
    pub fn describe(&self, labels: &Labels) -> String {
        self.render(|c| c.describe(labels))
    }

    fn render(&self, counterexample: impl Fn(&Counterexample) -> String) -> String {
        let mut line = match &self.verdict {
            Verdict::Holds => format!("{}: holds", self.property),
            Verdict::Fails { counterexample: c } => {
                format!("{}: fails ({})", self.property, counterexample(c))
            }
            Verdict::Undetermined { reason } => {
                format!("{}: undetermined ({reason})", self.property)
            }
        };
        if let Some(note) = &self.note {
            line.push_str(&format!(" [{note}]"));
        }
        line
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|c| c.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_classes_are_stable() {
        assert_eq!(
            VerificationReport::holds(Property::NoEnvy).verdict_class(),
            "holds"
        );
        assert_eq!(
            VerificationReport::undetermined(Property::StrategyProofness, "budget").verdict_class(),
            "undetermined"
        );
    }

    #[test]
    fn display_includes_counterexample_and_note() {
        let report = VerificationReport::fails(
            Property::NoEnvy,
            Counterexample::Envy {
                envier: 0,
                envied: 1,
                prefix: 1,
                envier_cumulative: 0.0,
                envied_cumulative: 1.0,
            },
        )
        .with_note("checked all pairs");
        assert_eq!(
            report.to_string(),
            "No envy: fails (a1 envies a2: on its top 1 good(s) it gets 0.0000 against 1.0000) [checked all pairs]"
        );
        assert!(report.is_fails());
        assert!(report.counterexample().is_some());
    }

    #[test]
    fn reports_round_trip_through_json() {
        let report = VerificationReport::undetermined(Property::ExPostEfficiency, "timeout");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"verdict\":\"undetermined\""));
        let back: VerificationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
