//! Progressive phone lookup: exact, then `+`-prefixed, then trailing digits. The first
//! stage that finds a lead wins and later stages are never queried.

use super::domain::Lead;
use super::store::{LeadTransaction, StoreError};

/// Digits compared by the loosest funnel stage (national number without country code).
pub const TRAILING_DIGITS: usize = 10;

/// Store-level predicate produced by a funnel stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneQuery {
    Exact(String),
    TrailingDigits(String),
}

impl PhoneQuery {
    pub fn matches(&self, stored: &str) -> bool {
        match self {
            PhoneQuery::Exact(expected) => stored == expected,
            PhoneQuery::TrailingDigits(expected) => {
                trailing_digits(stored, expected.len()).as_deref() == Some(expected.as_str())
            }
        }
    }
}

pub trait PhoneMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    /// `None` when the stage cannot apply to this input.
    fn query(&self, raw: &str) -> Option<PhoneQuery>;
}

pub struct ExactMatch;

impl PhoneMatcher for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn query(&self, raw: &str) -> Option<PhoneQuery> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| PhoneQuery::Exact(trimmed.to_string()))
    }
}

pub struct PlusPrefixed;

impl PhoneMatcher for PlusPrefixed {
    fn name(&self) -> &'static str {
        "plus_prefixed"
    }

    fn query(&self, raw: &str) -> Option<PhoneQuery> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('+') {
            return None;
        }
        Some(PhoneQuery::Exact(format!("+{trimmed}")))
    }
}

pub struct TrailingDigitsMatch {
    pub digits: usize,
}

impl PhoneMatcher for TrailingDigitsMatch {
    fn name(&self) -> &'static str {
        "trailing_digits"
    }

    fn query(&self, raw: &str) -> Option<PhoneQuery> {
        trailing_digits(raw, self.digits).map(PhoneQuery::TrailingDigits)
    }
}

/// Which stage located the lead.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelMatch {
    pub lead: Lead,
    pub stage: &'static str,
}

pub struct PhoneFunnel {
    stages: Vec<Box<dyn PhoneMatcher>>,
}

impl Default for PhoneFunnel {
    fn default() -> Self {
        Self::standard()
    }
}

impl PhoneFunnel {
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ExactMatch),
            Box::new(PlusPrefixed),
            Box::new(TrailingDigitsMatch {
                digits: TRAILING_DIGITS,
            }),
        ])
    }

    pub fn new(stages: Vec<Box<dyn PhoneMatcher>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn locate(
        &self,
        tx: &mut dyn LeadTransaction,
        raw: &str,
    ) -> Result<Option<FunnelMatch>, StoreError> {
        for stage in &self.stages {
            let Some(query) = stage.query(raw) else {
                continue;
            };
            if let Some(lead) = tx.lead_by_phone(&query)? {
                return Ok(Some(FunnelMatch {
                    lead,
                    stage: stage.name(),
                }));
            }
        }
        Ok(None)
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Last `count` digits of `raw`, ignoring punctuation; `None` when fewer are present.
pub fn trailing_digits(raw: &str, count: usize) -> Option<String> {
    let digits = digits_only(raw);
    if count == 0 || digits.len() < count {
        return None;
    }
    Some(digits[digits.len() - count..].to_string())
}
