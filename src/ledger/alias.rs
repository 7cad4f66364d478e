//! Alias format rules
//!
//! Four mutually exclusive patterns, one per [`KeyType`]. An alias that matches
//! none of them is rejected before any store lookup.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::KeyType;

/// Longest alias accepted (RFC 5321 limits an address path to 254 octets)
pub const MAX_ALIAS_LEN: usize = 254;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("alias regex failed to compile: {error}"))
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| compile(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| compile(r"^\+[0-9]+$"));
static CPF_RE: Lazy<Regex> = Lazy::new(|| compile(r"^\d{3}\.\d{3}\.\d{3}-\d{2}$"));
// Random keys are issued as UUID-shaped tokens; plain alphanumerics are accepted too.
static RANDOM_RE: Lazy<Regex> = Lazy::new(|| compile(r"^[a-zA-Z0-9][a-zA-Z0-9-]*$"));

impl KeyType {
    /// Check whether `alias` has the shape required by this key type
    pub fn matches(&self, alias: &str) -> bool {
        if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
            return false;
        }
        match self {
            KeyType::Email => EMAIL_RE.is_match(alias),
            KeyType::Phone => PHONE_RE.is_match(alias),
            KeyType::Cpf => CPF_RE.is_match(alias),
            KeyType::Random => RANDOM_RE.is_match(alias),
        }
    }
}

/// Classify an alias by shape. `None` means the alias is malformed.
pub fn detect_key_type(alias: &str) -> Option<KeyType> {
    [KeyType::Email, KeyType::Phone, KeyType::Cpf, KeyType::Random]
        .into_iter()
        .find(|kind| kind.matches(alias))
}
