//! Declared values
//!
//! A holder may state a claim inside the token itself with a caveat of the
//! form `declared <key> <value>`. Before verification the gateway collects
//! those claims into a [`Declared`] map so checkers can consult them. The map
//! is informational: a claim only carries weight through the `declared`
//! caveat that made it, and that caveat is verified like any other.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::token::TokenChain;

/// Condition name of declaration caveats
pub const DECLARED_CONDITION: &str = "declared";

/// Claims inferred from a token chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Declared(BTreeMap<String, String>);

impl Declared {
    /// Value claimed for `key`, if any
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether no claims were found
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of claims
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Claims in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Declared {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Split a declaration argument into `(key, value)`. The value is the rest
/// of the argument and may contain spaces.
pub fn parse_declaration(argument: &str) -> Option<(&str, &str)> {
    match argument.split_once(' ') {
        Some((key, value)) if !key.is_empty() => Some((key, value)),
        _ => None,
    }
}

/// Collect every `declared` caveat in the chain.
///
/// A key declared twice with different values is dropped altogether.
pub fn infer_declared(chain: &TokenChain) -> Declared {
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    let mut conflicts: BTreeSet<String> = BTreeSet::new();

    let declarations = chain
        .tokens()
        .iter()
        .flat_map(|token| token.caveats())
        .filter(|caveat| caveat.name() == DECLARED_CONDITION)
        .filter_map(|caveat| parse_declaration(caveat.argument()));

    for (key, value) in declarations {
        if conflicts.contains(key) {
            continue;
        }
        let conflicting = values
            .get(key)
            .is_some_and(|existing: &String| existing != value);
        if conflicting {
            values.remove(key);
            conflicts.insert(key.to_string());
        } else if !values.contains_key(key) {
            values.insert(key.to_string(), value.to_string());
        }
    }

    Declared(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::CapabilityToken;
    use capstore_core::TokenId;

    fn chain_with(conditions: &[&str]) -> TokenChain {
        let mut token = CapabilityToken::new(b"key", TokenId::from_carried("t"), "");
        for condition in conditions {
            token.add_first_party_caveat(*condition);
        }
        TokenChain::single(token)
    }

    #[test]
    fn collects_declarations() {
        let declared = infer_declared(&chain_with(&[
            "object abc",
            "declared username bob",
            "declared note hello world",
        ]));
        assert_eq!(declared.len(), 2);
        assert_eq!(declared.get("username"), Some("bob"));
        assert_eq!(declared.get("note"), Some("hello world"));
    }

    #[test]
    fn conflicting_declarations_are_dropped() {
        let declared = infer_declared(&chain_with(&[
            "declared username bob",
            "declared username alice",
            "declared username bob",
        ]));
        assert_eq!(declared.get("username"), None);
    }

    #[test]
    fn repeated_identical_declarations_are_kept() {
        let declared = infer_declared(&chain_with(&[
            "declared username bob",
            "declared username bob",
        ]));
        assert_eq!(declared.get("username"), Some("bob"));
    }

    #[test]
    fn malformed_declarations_are_ignored() {
        let declared = infer_declared(&chain_with(&["declared", "declared lonely"]));
        assert!(declared.is_empty());
    }
}
