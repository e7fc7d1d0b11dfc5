use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ExchangeError, ExchangeId};

/// How one exchange error code should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorRule {
    /// Take the error as the final outcome.
    pub accept: bool,
    /// Wait before retrying, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<u64>,
}

impl ErrorRule {
    pub const TERMINAL: Self = Self {
        accept: true,
        sleep_ms: None,
    };

    pub const fn retry_after(millis: u64) -> Self {
        Self {
            accept: false,
            sleep_ms: Some(millis),
        }
    }
}

/// Maps raw exchange error codes to [`ExchangeError`] retry semantics.
///
/// Rules match the exact code first, then the longest rule that prefixes
/// the code (Kraken appends details such as `EGeneral:Invalid arguments:volume`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    rules: BTreeMap<String, ErrorRule>,
    fallback: ErrorRule,
}

impl ErrorClassifier {
    pub fn new(rules: impl IntoIterator<Item = (String, ErrorRule)>, fallback: ErrorRule) -> Self {
        Self {
            rules: rules.into_iter().collect(),
            fallback,
        }
    }

    pub fn defaults(exchange: ExchangeId) -> Self {
        let rules: &[(&str, ErrorRule)] = match exchange {
            ExchangeId::Kraken => &[
                ("EAPI:Rate limit exceeded", ErrorRule::retry_after(5_000)),
                ("EAPI:Invalid nonce", ErrorRule::retry_after(0)),
                ("EService:Unavailable", ErrorRule::retry_after(2_000)),
                ("EService:Busy", ErrorRule::retry_after(2_000)),
                ("EGeneral:Temporary lockout", ErrorRule::retry_after(10_000)),
                ("EGeneral:Invalid arguments", ErrorRule::TERMINAL),
            ],
            ExchangeId::Binance => &[
                ("-1003", ErrorRule::retry_after(10_000)),
                ("-1001", ErrorRule::retry_after(1_000)),
                ("-1021", ErrorRule::retry_after(0)),
            ],
            ExchangeId::Ftx => &[("Please retry request", ErrorRule::retry_after(1_000))],
        };

        Self::new(
            rules.iter().map(|(code, rule)| ((*code).to_owned(), *rule)),
            ErrorRule::TERMINAL,
        )
    }

    /// Layer rules from the settings file over the current table.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, ErrorRule>) -> Self {
        self.rules
            .extend(overrides.iter().map(|(code, rule)| (code.clone(), *rule)));
        self
    }

    pub fn rule(&self, code: &str) -> ErrorRule {
        if let Some(rule) = self.rules.get(code) {
            return *rule;
        }
        self.rules
            .iter()
            .filter(|(prefix, _)| code.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rule)| *rule)
            .unwrap_or(self.fallback)
    }

    pub fn classify(&self, code: &str, message: &str) -> ExchangeError {
        let rule = self.rule(code);
        ExchangeError {
            code: code.to_owned(),
            message: message.to_owned(),
            accept: rule.accept,
            sleep: rule.sleep_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kraken_rate_limit_is_transient_with_sleep() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Kraken);
        let error = classifier.classify("EAPI:Rate limit exceeded", "");

        assert!(!error.accept);
        assert_eq!(error.sleep, Some(Duration::from_secs(5)));
    }

    #[test]
    fn detailed_kraken_code_matches_prefix_rule() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Kraken);
        let error = classifier.classify("EGeneral:Invalid arguments:volume", "");

        assert!(error.accept);
    }

    #[test]
    fn unknown_codes_fall_back_to_terminal() {
        let classifier = ErrorClassifier::defaults(ExchangeId::Binance);
        let error = classifier.classify("-2010", "insufficient balance");

        assert!(error.accept);
        assert_eq!(error.sleep, None);
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = BTreeMap::from([(String::from("-1003"), ErrorRule::TERMINAL)]);
        let classifier = ErrorClassifier::defaults(ExchangeId::Binance).with_overrides(&overrides);

        assert_eq!(classifier.rule("-1003"), ErrorRule::TERMINAL);
        assert_eq!(classifier.rule("-1001"), ErrorRule::retry_after(1_000));
    }
}
