//! Rate label parsing.

use crate::error::ParseError;

/// Label prefix rendered by the rate page.
pub const DEFAULT_LABEL_PREFIX: &str = "SGD 1.00 = MYR ";

/// Turns a label like `"SGD 1.00 = MYR 3.1234"` into `3.1234`.
#[derive(Debug, Clone)]
pub struct RateParser {
    prefix: String,
}

impl RateParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parse a label. Outer whitespace is ignored; the prefix must match exactly.
    pub fn parse(&self, label: &str) -> Result<f64, ParseError> {
        let label = label.trim();

        // A trailing space in the prefix is lost when the label itself is trimmed.
        let rest = match label.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest,
            None if label == self.prefix.trim_end() => "",
            None => {
                return Err(ParseError::MissingPrefix {
                    label: label.to_string(),
                    prefix: self.prefix.clone(),
                });
            }
        };

        let value = rest.trim();
        if value.is_empty() {
            return Err(ParseError::Empty(label.to_string()));
        }

        let rate: f64 = value.parse().map_err(|e: std::num::ParseFloatError| {
            ParseError::InvalidNumber {
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !rate.is_finite() {
            return Err(ParseError::NotFinite(value.to_string()));
        }
        Ok(rate)
    }
}

impl Default for RateParser {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        let parser = RateParser::default();
        assert_eq!(parser.parse("SGD 1.00 = MYR 3.1234").unwrap(), 3.1234);
    }

    #[test]
    fn test_parse_ignores_outer_whitespace() {
        let parser = RateParser::default();
        assert_eq!(parser.parse("  SGD 1.00 = MYR 3.2\n").unwrap(), 3.2);
    }

    #[test]
    fn test_wrong_prefix() {
        let parser = RateParser::default();
        assert!(matches!(
            parser.parse("MYR abc"),
            Err(ParseError::MissingPrefix { .. })
        ));
        assert!(matches!(
            parser.parse("sgd 1.00 = myr 3.1"),
            Err(ParseError::MissingPrefix { .. })
        ));
    }

    #[test]
    fn test_empty_remainder() {
        let parser = RateParser::default();
        assert!(matches!(parser.parse("SGD 1.00 = MYR "), Err(ParseError::Empty(_))));
        assert!(matches!(parser.parse("SGD 1.00 = MYR"), Err(ParseError::Empty(_))));
    }

    #[test]
    fn test_non_numeric_remainder() {
        let parser = RateParser::default();
        assert!(matches!(
            parser.parse("SGD 1.00 = MYR abc"),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parser.parse("SGD 1.00 = MYR 3,10"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let parser = RateParser::default();
        assert!(matches!(parser.parse("SGD 1.00 = MYR NaN"), Err(ParseError::NotFinite(_))));
        assert!(matches!(parser.parse("SGD 1.00 = MYR inf"), Err(ParseError::NotFinite(_))));
    }

    #[test]
    fn test_custom_prefix() {
        let parser = RateParser::new("USD 1.00 = EUR ");
        assert_eq!(parser.prefix(), "USD 1.00 = EUR ");
        assert_eq!(parser.parse("USD 1.00 = EUR 0.9").unwrap(), 0.9);
    }
}
