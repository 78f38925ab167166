use crate::constants::DEFAULT_FORBIDDEN_TERMS;

/// Classifies message text as flagged or clean.
///
/// Implementations must be pure: the same text always yields the same answer
/// and classification never fails.
pub trait ContentClassifier: Send + Sync {
    fn is_flagged(&self, text: &str) -> bool;
}

// Case-insensitive substring match against a fixed term list.
// Terms are lowercased once at construction; empty terms are dropped so that
// they can never match every message.
#[derive(Debug, Clone)]
pub struct TermListFilter {
    terms: Vec<String>,
}

impl TermListFilter {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl Default for TermListFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN_TERMS)
    }
}

impl ContentClassifier for TermListFilter {
    fn is_flagged(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.terms.iter().any(|term| lowered.contains(term.as_str()))
    }
}
