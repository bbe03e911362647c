/// Decides whether a pushed message is acceptable content.
pub trait ContentClassifier: Send + Sync {
    fn accepts(&self, message: &str) -> bool;
}

/// Rejects messages containing any blocked word, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    blocked: Vec<String>,
}

impl KeywordClassifier {
    #[must_use]
    pub fn new(blocked: &[String]) -> Self {
        Self {
            blocked: blocked.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

impl ContentClassifier for KeywordClassifier {
    fn accepts(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        !self.blocked.iter().any(|word| message.contains(word.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_classifier() {
        let classifier = KeywordClassifier::new(&["Giveaway".to_string(), "promo".to_string()]);
        assert!(classifier.accepts("New artwork by the team"));
        assert!(!classifier.accepts("Huge GIVEAWAY this weekend"));
        assert!(!classifier.accepts("promo code inside"));
        assert!(KeywordClassifier::default().accepts("anything"));
    }
}
