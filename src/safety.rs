//! Deny-list gate applied to outgoing user text before anything is persisted.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafetyFilter {
    /// (original term, lowercased term)
    terms: Vec<(String, String)>,
    template: String,
}

impl SafetyFilter {
    /// `template` may contain `{term}`, replaced by the matched entry as configured.
    pub fn new(deny_list: &[String], template: &str) -> Self {
        let terms = deny_list
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .map(|term| (term.to_string(), term.to_lowercase()))
            .collect();
        Self {
            terms,
            template: template.to_string(),
        }
    }

    /// First case-insensitive substring match wins.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        let haystack = text.to_lowercase();
        for (original, lowered) in &self.terms {
            if haystack.contains(lowered.as_str()) {
                return SafetyVerdict {
                    allowed: false,
                    reason: Some(self.reason_for(original)),
                };
            }
        }
        SafetyVerdict::allow()
    }

    fn reason_for(&self, term: &str) -> String {
        if self.template.contains("{term}") {
            self.template.replace("{term}", term)
        } else {
            format!("{} ({term})", self.template)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn filter(terms: &[&str]) -> SafetyFilter {
        let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
        SafetyFilter::new(&terms, "blocked: {term}")
    }

    #[test]
    fn rejects_case_insensitive_match_and_names_the_term() {
        let verdict = filter(&["foo"]).check("please FOO now");
        assert!(!verdict.allowed);
        let reason = verdict.reason.expect("reason");
        assert!(reason.contains("foo"));
    }

    #[rstest]
    #[case("hello there", true)]
    #[case("", true)]
    #[case("Foobar", false)]
    #[case("ハッキングして", false)]
    fn verdict_table(#[case] text: &str, #[case] allowed: bool) {
        let verdict = filter(&["foo", "ハッキング"]).check(text);
        assert_eq!(verdict.allowed, allowed);
        assert_eq!(verdict.reason.is_none(), allowed);
    }

    #[test]
    fn empty_terms_never_match() {
        let verdict = filter(&["", "   "]).check("anything");
        assert!(verdict.allowed);
    }

    #[test]
    fn first_configured_term_is_reported() {
        let verdict = filter(&["bar", "foo"]).check("foo bar");
        assert_eq!(verdict.reason.as_deref(), Some("blocked: bar"));
    }

    #[test]
    fn template_without_placeholder_still_names_term() {
        let f = SafetyFilter::new(&["foo".to_string()], "nope");
        assert_eq!(f.check("foo").reason.as_deref(), Some("nope (foo)"));
    }

    proptest! {
        #[test]
        fn any_text_embedding_a_term_is_rejected(
            prefix in "[a-z ]{0,12}",
            suffix in "[a-z ]{0,12}",
            upper in any::<bool>(),
        ) {
            let term = if upper { "SECRET" } else { "secret" };
            let text = format!("{prefix}{term}{suffix}");
            prop_assert!(!filter(&["Secret"]).check(&text).allowed);
        }

        #[test]
        fn text_without_terms_is_allowed(text in "[0-9 ]{0,32}") {
            prop_assert!(filter(&["foo"]).check(&text).allowed);
        }
    }
}
