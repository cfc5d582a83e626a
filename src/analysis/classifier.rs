use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};

/// Error patterns used when the configuration does not name any
pub const DEFAULT_ERROR_PATTERNS: &[&str] = &[
    r"\berror\b",
    r"\bfatal\b",
    r"\bcritical\b",
    r"exception",
    r"failed",
    r"traceback",
];

/// Decides whether a log message describes an error
///
/// Holds an ordered list of case-insensitive patterns compiled once from
/// configuration. A message is an error iff any pattern matches anywhere in
/// it; pattern order only affects how early the search stops.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<Regex>,
}

impl ErrorClassifier {
    /// Compile the given patterns case-insensitively
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for the first pattern that does not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.as_ref().to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Classifier over `DEFAULT_ERROR_PATTERNS`
    pub fn with_defaults() -> Self {
        Self {
            patterns: DEFAULT_ERROR_PATTERNS
                .iter()
                .filter_map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .ok()
                })
                .collect(),
        }
    }

    /// `true` iff at least one pattern matches somewhere in `message`
    pub fn classify(&self, message: &str) -> bool {
        classify(message, &self.patterns)
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `true` iff any of `patterns` matches anywhere in `message`
pub fn classify(message: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_all_compile() {
        let classifier = ErrorClassifier::with_defaults();
        assert_eq!(classifier.pattern_count(), DEFAULT_ERROR_PATTERNS.len());
    }

    #[test]
    fn test_classify_matches_case_insensitively() {
        let classifier = ErrorClassifier::with_defaults();

        assert!(classifier.classify("ERROR: Database connection failed after 30s timeout"));
        assert!(classifier.classify("error: lowercase works too"));
        assert!(classifier.classify("java.lang.NullPointerException at Foo.bar"));
        assert!(classifier.classify("Traceback (most recent call last):"));
        assert!(classifier.classify("FATAL out of file descriptors"));
    }

    #[test]
    fn test_classify_ignores_non_error_lines() {
        let classifier = ErrorClassifier::with_defaults();

        assert!(!classifier.classify("INFO: Application started successfully"));
        assert!(!classifier.classify("WARN: Memory usage at 90% of available heap"));
        assert!(!classifier.classify(""));
    }

    #[test]
    fn test_word_boundaries_avoid_false_positives() {
        let classifier = ErrorClassifier::with_defaults();
        assert!(!classifier.classify("GET /api/errorless-endpoint 200"));
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = ErrorClassifier::new(&["timeout", r"status=5\d\d"]).unwrap();

        assert!(classifier.classify("upstream TIMEOUT reached"));
        assert!(classifier.classify("request done status=503"));
        assert!(!classifier.classify("request done status=200"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = ErrorClassifier::new(&["valid", "(unclosed"]);
        match result {
            Err(ConfigError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            other => panic!("expected invalid pattern error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_pattern_set_never_matches() {
        let classifier = ErrorClassifier::new::<&str>(&[]).unwrap();
        assert!(!classifier.classify("ERROR everything is on fire"));
    }

    #[test]
    fn test_pattern_order_does_not_change_outcome() {
        let forward = ErrorClassifier::new(&["alpha", "beta"]).unwrap();
        let reverse = ErrorClassifier::new(&["beta", "alpha"]).unwrap();

        for message in ["alpha only", "beta only", "both alpha beta", "neither"] {
            assert_eq!(forward.classify(message), reverse.classify(message));
        }
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    // Any message containing a configured literal is classified as an error
    #[quickcheck]
    fn prop_message_containing_pattern_is_error(prefix: String, suffix: String) -> bool {
        let classifier = ErrorClassifier::new(&["failed"]).unwrap();
        let message = format!("{} FAILED {}", prefix, suffix);
        classifier.classify(&message)
    }

    // Messages built only from digits never match the default word patterns
    #[quickcheck]
    fn prop_digit_only_messages_are_not_errors(digits: Vec<u8>) -> bool {
        let classifier = ErrorClassifier::with_defaults();
        let message: String = digits
            .iter()
            .map(|d| char::from(b'0' + d % 10))
            .collect();
        !classifier.classify(&message)
    }
}
