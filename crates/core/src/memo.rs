//! Payment address extraction from account memos.
//!
//! Senders put the external address they want to be paid on into their
//! on-chain memo, usually surrounded by free text. Extraction is
//! best-effort: patterns are tried in order and the first one matching
//! anywhere in the memo wins. A memo without a recognizable address is not
//! an error; the exchange is recorded with [`NO_ADDRESS_FOUND`].

use regex::Regex;

use crate::error::{IndexerError, IndexerResult};
use crate::models::NO_ADDRESS_FOUND;

/// Default external address formats, in match priority order.
///
/// Longer formats go first: a Bitcoin-shaped run of characters can be found
/// inside both Monero and cashaddr addresses.
pub const DEFAULT_ADDRESS_PATTERNS: &[&str] = &[
    // Monero
    r"(4|8)[1-9A-HJ-NP-Za-km-z]{94}",
    // Bitcoin Cash cashaddr
    r"(q|p)[a-z0-9]{41}",
    // Bitcoin legacy / P2SH
    r"(1|3)[a-km-zA-HJ-NP-Z1-9]{25,34}",
];

/// Ordered list of compiled address patterns.
#[derive(Debug, Clone)]
pub struct AddressExtractor {
    patterns: Vec<Regex>,
}

impl AddressExtractor {
    /// Compile patterns from configuration. Fails on the first invalid regex.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> IndexerResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    IndexerError::ConfigError(format!(
                        "invalid address pattern '{}': {}",
                        p.as_ref(),
                        e
                    ))
                })
            })
            .collect::<IndexerResult<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(IndexerError::ConfigError(
                "at least one address pattern is required".into(),
            ));
        }

        Ok(Self { patterns })
    }

    /// Number of configured patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First address matched in `memo`, by pattern order.
    pub fn extract(&self, memo: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.find(memo))
            .map(|m| m.as_str().to_string())
    }

    /// Like [`extract`](Self::extract) but falls back to the sentinel.
    pub fn payment_address_or_sentinel(&self, memo: &str) -> String {
        self.extract(memo)
            .unwrap_or_else(|| NO_ADDRESS_FOUND.to_string())
    }
}

impl Default for AddressExtractor {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_ADDRESS_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}
