//! Tests for identifier minting
//!
//! Object identifiers end up in URL paths and in `object` caveats, so the
//! encoding and entropy guarantees matter to every other crate.

#![allow(clippy::expect_used)]

use base64::Engine;
use capstore_core::identifiers::{OBJECT_ID_ENTROPY, ROOT_KEY_LEN, TOKEN_ID_ENTROPY};
use capstore_core::{ObjectId, RootKey, TokenId};
use std::collections::HashSet;

#[test]
fn object_ids_are_url_safe_and_carry_full_entropy() {
    let id = ObjectId::generate().expect("entropy available");
    let text = id.as_str();

    assert!(text
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'=')));

    let decoded = base64::engine::general_purpose::URL_SAFE
        .decode(text)
        .expect("identifier is URL-safe base64");
    assert_eq!(decoded.len(), OBJECT_ID_ENTROPY);

    // A freshly minted id always survives the path-side validation
    assert_eq!(ObjectId::parse(text).expect("valid"), id);
}

#[test]
fn object_ids_do_not_repeat() {
    let ids: HashSet<ObjectId> = (0..256)
        .map(|_| ObjectId::generate().expect("entropy available"))
        .collect();
    assert_eq!(ids.len(), 256);
}

#[test]
fn token_ids_are_hex() {
    let id = TokenId::generate().expect("entropy available");
    let decoded = hex::decode(id.as_str()).expect("hex");
    assert_eq!(decoded.len(), TOKEN_ID_ENTROPY);
}

#[test]
fn root_keys_are_fresh() {
    let a = RootKey::generate().expect("entropy available");
    let b = RootKey::generate().expect("entropy available");
    assert_eq!(a.as_bytes().len(), ROOT_KEY_LEN);
    assert_ne!(a, b);
}

#[test]
fn object_id_serializes_as_plain_string() {
    let id = ObjectId::parse("Ab12-_==").expect("valid");
    let json = serde_json::to_string(&id).expect("serialize");
    assert_eq!(json, "\"Ab12-_==\"");
}
