//! Keyword heuristics: a model-free fallback analysis.
//!
//! Used when no model is configured (the server's `heuristic` mode). The
//! rules match on lowercase stems so English and Spanish briefs both hit.

use tracing::debug;

use crate::types::record::{BusinessContextRecord, NO_CONTENT};

/// Characters of combined text kept as the business overview.
pub const OVERVIEW_CHARS: usize = 500;

/// (stems, objective) pairs; an objective is added when any stem appears.
const OBJECTIVE_RULES: [(&[&str], &str); 4] = [
    (&["optim"], "Optimize operational processes"),
    (&["cost", "costo"], "Reduce costs"),
    (&["integr"], "Integrate existing systems"),
    (&["sap"], "Integrate with the SAP ERP"),
];

const FALLBACK_OBJECTIVE: &str = "Identify the client's key objectives";

const DEFAULT_QUESTIONS: [&str; 2] = [
    "What are the specific KPIs?",
    "What is the maximum budget?",
];

const DEFAULT_OPPORTUNITIES: [&str; 2] = ["Automate advanced analytics", "Explore predictive modules"];

/// Builds a [`BusinessContextRecord`] from keyword rules alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, client_name: Option<&str>, text: &str) -> BusinessContextRecord {
        if text.trim().is_empty() {
            let mut record = BusinessContextRecord::no_content();
            record.client_name = client_name.map(str::to_string);
            return record;
        }

        let lower = text.to_lowercase();
        let record = BusinessContextRecord {
            client_name: client_name.map(str::to_string),
            business_overview: Some(overview(text)),
            objectives: objectives(&lower),
            additional_context_questions: DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            potential_future_opportunities: opportunities(&lower),
            ..Default::default()
        };

        debug!(
            objectives = record.objectives.len(),
            chars = text.chars().count(),
            "Heuristic analysis complete"
        );
        record
    }
}

fn overview(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.char_indices();
    match chars.nth(OVERVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None if text.is_empty() => NO_CONTENT.to_string(),
        None => text.to_string(),
    }
}

fn objectives(lower: &str) -> Vec<String> {
    let found: Vec<String> = OBJECTIVE_RULES
        .iter()
        .filter(|(stems, _)| stems.iter().any(|stem| lower.contains(stem)))
        .map(|(_, objective)| objective.to_string())
        .collect();

    if found.is_empty() {
        vec![FALLBACK_OBJECTIVE.to_string()]
    } else {
        found
    }
}

fn opportunities(lower: &str) -> Vec<String> {
    let mut ops: Vec<String> = DEFAULT_OPPORTUNITIES.iter().map(|o| o.to_string()).collect();
    if lower.contains("machine learning") {
        ops.push("Implement custom ML models".to_string());
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_drive_objectives() {
        let record = HeuristicAnalyzer::new().analyze(
            Some("ACME Corp"),
            "ACME quiere integrar ERP SAP y reducir costos",
        );

        assert_eq!(record.client_name.as_deref(), Some("ACME Corp"));
        assert_eq!(
            record.objectives,
            vec!["Reduce costs", "Integrate existing systems", "Integrate with the SAP ERP"]
        );
        assert_eq!(record.additional_context_questions.len(), 2);
        assert_eq!(record.potential_future_opportunities.len(), 2);
    }

    #[test]
    fn test_fallback_objective_and_ml_opportunity() {
        let record = HeuristicAnalyzer::new().analyze(None, "We are exploring machine learning.");
        assert_eq!(record.objectives, vec![FALLBACK_OBJECTIVE]);
        assert!(record
            .potential_future_opportunities
            .contains(&"Implement custom ML models".to_string()));
    }

    #[test]
    fn test_overview_is_truncated_on_char_boundary() {
        let text = "é".repeat(OVERVIEW_CHARS + 10);
        let record = HeuristicAnalyzer::new().analyze(None, &text);
        let overview = record.business_overview.unwrap();
        assert!(overview.ends_with("..."));
        assert_eq!(overview.chars().count(), OVERVIEW_CHARS + 3);
    }

    #[test]
    fn test_empty_text_has_placeholders() {
        let record = HeuristicAnalyzer::new().analyze(Some("ACME"), "  \n ");
        assert_eq!(record.client_name.as_deref(), Some("ACME"));
        assert_eq!(record.business_overview.as_deref(), Some(NO_CONTENT));
        assert_eq!(record.company_info.as_deref(), Some(NO_CONTENT));
        assert!(record.objectives.is_empty());
        assert!(record.additional_context_questions.is_empty());
        assert!(record.potential_future_opportunities.is_empty());
    }
}
