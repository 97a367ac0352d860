//! Adaptive retrieval planner: query phrasing -> result budget k

use crate::config::{default_planner_rules, PlannerRule, RetrievalConfig};

/// k used when no rule matches
pub const DEFAULT_K: usize = 50;

/// Table-driven phrasing classifier
///
/// Case-insensitive substring containment, rules checked in order, first
/// match wins. Overlaps are not resolved any smarter than that: "was it
/// better than last year" lands in the comparison rule because "better" is
/// found before any trend keyword would be.
#[derive(Debug, Clone)]
pub struct AdaptiveRetrievalPlanner {
    rules: Vec<PlannerRule>,
    default_k: usize,
}

impl AdaptiveRetrievalPlanner {
    pub fn new(rules: Vec<PlannerRule>, default_k: usize) -> Self {
        // Lowercase once so matching is a plain `contains`
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.keywords = rule.keywords.iter().map(|kw| kw.to_lowercase()).collect();
                rule
            })
            .collect();
        Self { rules, default_k }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.planner_rules.clone(), config.default_k)
    }

    /// First rule whose keyword occurs in the query
    pub fn classify(&self, query: &str) -> Option<&PlannerRule> {
        let query = query.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| query.contains(kw.as_str())))
    }

    /// Result budget for the query
    pub fn plan(&self, query: &str) -> usize {
        match self.classify(query) {
            Some(rule) => {
                tracing::debug!(rule = %rule.name, k = rule.k, "Planner rule matched");
                rule.k
            }
            None => self.default_k,
        }
    }
}

impl Default for AdaptiveRetrievalPlanner {
    fn default() -> Self {
        Self::new(default_planner_rules(), DEFAULT_K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_queries() {
        let planner = AdaptiveRetrievalPlanner::default();
        assert_eq!(planner.plan("How many 1-star reviews are there?"), 1000);
        assert_eq!(planner.plan("Compare service vs food"), 100);
        assert_eq!(planner.plan("Tell me about a specific complaint"), 30);
        assert_eq!(planner.plan("Random unrelated phrasing"), 50);
    }

    #[test]
    fn test_case_insensitive() {
        let planner = AdaptiveRetrievalPlanner::default();
        assert_eq!(planner.plan("SUMMARIZE the feedback"), 1000);
        assert_eq!(planner.plan("Give me an EXAMPLE"), 30);
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let planner = AdaptiveRetrievalPlanner::default();
        // analytic outranks comparison
        assert_eq!(planner.plan("Summarize what is better now"), 1000);
        // comparison outranks the trend reading of this question
        assert_eq!(planner.plan("Was it better than last year?"), 100);
        assert_eq!(
            planner.classify("Was it better than last year?").unwrap().name,
            "comparison"
        );
    }

    #[test]
    fn test_custom_table() {
        let planner = AdaptiveRetrievalPlanner::new(
            vec![PlannerRule {
                name: "staff".to_string(),
                keywords: vec!["Waiter".to_string()],
                k: 7,
            }],
            12,
        );
        assert_eq!(planner.plan("was the waiter friendly"), 7);
        assert_eq!(planner.plan("how many reviews"), 12);
        assert!(planner.classify("anything").is_none());
    }
}
