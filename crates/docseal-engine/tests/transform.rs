//! End-to-end behaviour of the transform engine on documents.

use docseal_crypto::binary_value;
use docseal_engine::{
    as_date, date_value, ConfigError, CryptoError, Document, FieldTreatment, SealError,
    SealOptions, Sealer, AUTH_CODE_FIELD, CIPHERTEXT_FIELD,
};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

const SECRET: &str = "a sufficiently long process-wide secret";

fn users_sealer() -> Sealer {
    Sealer::configure(
        SealOptions::with_secret(SECRET)
            .encrypted_fields(["name", "age"])
            .authenticated_fields(["email"]),
    )
    .expect("configure sealer")
}

fn joe() -> Document {
    Document::from_value(
        "users",
        json!({"_id": "u-1", "name": "Joe", "age": 42, "email": "joe@example.com"}),
    )
    .expect("document")
}

/// A document with Joe's per-document key registered.
fn keyed_joe(sealer: &Sealer) -> (Document, String) {
    let key = sealer.keygen("joe's password").unwrap();
    let mut doc = joe();
    doc.register_key(&key).unwrap();
    (doc, key)
}

fn sealed_joe(sealer: &Sealer) -> (Document, String) {
    let (mut doc, key) = keyed_joe(sealer);
    let sealed = sealer.save_transform(&mut doc).unwrap();
    (sealed, key)
}

fn flip_byte_in_binary(doc: &mut Document, field: &str, index: usize) {
    let mut bytes = match field {
        CIPHERTEXT_FIELD => doc.ciphertext().unwrap(),
        _ => doc.auth_code().unwrap(),
    };
    bytes[index] ^= 0x01;
    doc.set(field, binary_value(&bytes));
}

// ============================================================================
// encrypt / decrypt
// ============================================================================

#[test]
fn encrypt_removes_fields_and_writes_ciphertext() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();

    assert!(doc.get("name").is_none());
    assert!(doc.get("age").is_none());
    assert_eq!(doc.get("email"), Some(&json!("joe@example.com")));
    assert_eq!(doc.get("_id"), Some(&json!("u-1")));
    let ciphertext = doc.ciphertext().unwrap();
    assert!(!ciphertext.is_empty());
    assert_eq!(ciphertext[0], b'a');
}

#[test]
fn decrypt_restores_exact_values_and_types() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();
    sealer.decrypt(&mut doc).unwrap();

    assert_eq!(doc, joe());
    assert!(doc.get("age").unwrap().is_u64());
    assert!(!doc.contains(CIPHERTEXT_FIELD));
}

#[test]
fn nested_values_and_dates_round_trip() {
    let sealer = Sealer::configure(SealOptions::with_secret(SECRET)).unwrap();
    let born = chrono::DateTime::parse_from_rfc3339("1990-05-17T08:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let original = json!({
        "_id": 9,
        "profile": {"tags": ["a", "b"], "score": 1.25, "flags": {"x": true, "y": null}},
        "born": date_value(born),
    });
    let mut doc = Document::from_value("people", original.clone()).unwrap();
    doc.register_key(&sealer.keygen("pw").unwrap()).unwrap();

    sealer.encrypt(&mut doc).unwrap();
    assert_eq!(doc.fields().len(), 2, "only _id and _ct remain");
    sealer.decrypt(&mut doc).unwrap();

    assert_eq!(doc.to_value(), original);
    assert_eq!(as_date(doc.get("born").unwrap()), Some(born));
}

#[test]
fn encryption_is_non_deterministic() {
    let sealer = users_sealer();
    let (mut first, key) = keyed_joe(&sealer);
    let mut second = first.clone();
    sealer.encrypt(&mut first).unwrap();
    sealer.encrypt(&mut second).unwrap();
    assert_ne!(first.ciphertext(), second.ciphertext());

    sealer.decrypt(&mut first).unwrap();
    second.register_key(&key).unwrap();
    sealer.decrypt(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn double_encrypt_is_detected() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();
    let ciphertext = doc.ciphertext();

    assert!(matches!(
        sealer.encrypt(&mut doc),
        Err(SealError::AlreadyEncrypted)
    ));
    assert_eq!(doc.ciphertext(), ciphertext);
}

#[test]
fn encrypt_drops_stale_auth_code() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.sign(&mut doc).unwrap();
    assert!(doc.is_signed());

    sealer.encrypt(&mut doc).unwrap();
    assert!(!doc.is_signed());
    assert!(!doc.contains(AUTH_CODE_FIELD));
}

#[test]
fn decrypted_fields_overwrite_cleartext() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();
    doc.set("name", json!("Mallory"));

    sealer.decrypt(&mut doc).unwrap();
    assert_eq!(doc.get("name"), Some(&json!("Joe")));
    assert_eq!(doc, joe());
}

#[test]
fn encrypt_keeps_order_of_remaining_fields() {
    let sealer = users_sealer();
    let mut doc = Document::from_value(
        "users",
        json!({"_id": "u-1", "name": "Joe", "email": "joe@example.com", "age": 42, "role": "admin"}),
    )
    .unwrap();
    doc.register_key(&sealer.keygen("pw").unwrap()).unwrap();
    sealer.encrypt(&mut doc).unwrap();

    let keys: Vec<&str> = doc.fields().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["_id", "email", "role", "_ct"]);
}

#[test]
fn decrypt_is_idempotent() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();
    sealer.decrypt(&mut doc).unwrap();
    let once = doc.clone();
    sealer.decrypt(&mut doc).unwrap();
    assert_eq!(doc, once);
}

#[test]
fn decrypt_without_key_fails() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    let before = doc.clone();
    assert!(matches!(
        sealer.decrypt(&mut doc),
        Err(SealError::NoKeyAvailable)
    ));
    assert_eq!(doc, before);
}

#[test]
fn decrypt_with_wrong_key_fails_generically() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.register_key(&sealer.keygen("not joe's password").unwrap())
        .unwrap();
    let err = sealer.decrypt(&mut doc).unwrap_err();
    assert!(err.is_decryption_failure());
    assert_eq!(err.to_string(), "Decryption failed");
}

#[test]
fn decrypt_discards_key_unless_retained() {
    let sealer = users_sealer();
    let (mut doc, key) = sealed_joe(&sealer);
    doc.register_key(&key).unwrap();
    sealer.decrypt(&mut doc).unwrap();
    assert!(!doc.has_key());

    let retaining = Sealer::configure(SealOptions {
        retain_document_key: true,
        ..SealOptions::with_secret(SECRET)
            .encrypted_fields(["name", "age"])
            .authenticated_fields(["email"])
    })
    .unwrap();
    let (mut doc, key) = sealed_joe(&retaining);
    doc.register_key(&key).unwrap();
    retaining.decrypt(&mut doc).unwrap();
    assert!(doc.has_key());
}

// ============================================================================
// per-document keys
// ============================================================================

#[test]
fn keygen_is_deterministic_per_secret() {
    let sealer = users_sealer();
    assert_eq!(
        sealer.keygen("password").unwrap(),
        sealer.keygen("password").unwrap()
    );
    assert_ne!(
        sealer.keygen("password").unwrap(),
        sealer.keygen("Password").unwrap()
    );

    // A second process configured with the same secret regenerates the key.
    let other_process = users_sealer();
    assert_eq!(
        sealer.keygen("password").unwrap(),
        other_process.keygen("password").unwrap()
    );
}

#[test]
fn regenerated_key_decrypts() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    let regenerated = users_sealer().keygen("joe's password").unwrap();
    doc.register_key(&regenerated).unwrap();
    sealer.load_transform(&mut doc).unwrap();
    assert_eq!(doc, joe());
}

#[test]
fn documents_have_independent_keys() {
    let sealer = users_sealer();
    let (joe_sealed, _) = sealed_joe(&sealer);

    let ann_key = sealer.keygen("ann's password").unwrap();
    let mut ann = Document::from_value(
        "users",
        json!({"_id": "u-2", "name": "Ann", "age": 30, "email": "ann@example.com"}),
    )
    .unwrap();
    ann.register_key(&ann_key).unwrap();
    sealer.save_transform(&mut ann).unwrap();

    let mut stolen = joe_sealed;
    stolen.register_key(&ann_key).unwrap();
    assert!(sealer.decrypt(&mut stolen).unwrap_err().is_decryption_failure());
}

// ============================================================================
// sign / authenticate
// ============================================================================

#[test]
fn sign_is_idempotent() {
    let sealer = users_sealer();
    let (mut doc, _) = keyed_joe(&sealer);
    sealer.encrypt(&mut doc).unwrap();
    sealer.sign(&mut doc).unwrap();
    let once = doc.clone();
    sealer.sign(&mut doc).unwrap();
    assert_eq!(doc, once);
}

#[test]
fn authenticate_does_not_mutate() {
    let sealer = users_sealer();
    let (doc, _) = sealed_joe(&sealer);
    let before = doc.clone();
    sealer.authenticate(&doc).unwrap();
    sealer.authenticate_sync(&doc).unwrap();
    assert!(sealer.verify_signature(&doc));
    assert_eq!(doc, before);
}

#[test]
fn mutated_authenticated_field_fails() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.set("email", json!("mallory@example.com"));
    assert!(matches!(
        sealer.authenticate(&doc),
        Err(SealError::AuthenticationFailed)
    ));
}

#[test]
fn removed_authenticated_field_fails() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.remove("email");
    assert!(sealer.authenticate(&doc).is_err());
}

#[test]
fn mutated_age_after_signing_fails() {
    // age is authenticated here rather than encrypted
    let sealer = Sealer::configure(
        SealOptions::with_secret(SECRET)
            .encrypted_fields(["name"])
            .authenticated_fields(["age"]),
    )
    .unwrap();
    let (mut doc, _) = keyed_joe(&sealer);
    let mut sealed = sealer.save_transform(&mut doc).unwrap();
    sealer.authenticate(&sealed).unwrap();

    sealed.set("age", json!(43));
    let err = sealer.authenticate(&sealed).unwrap_err();
    assert!(err.is_authentication_failure());
}

#[test]
fn changed_id_fails() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.set("_id", json!("u-2"));
    assert!(sealer.authenticate(&doc).is_err());
}

#[test]
fn any_ciphertext_byte_flip_fails() {
    let sealer = users_sealer();
    let (doc, _) = sealed_joe(&sealer);
    let len = doc.ciphertext().unwrap().len();
    for index in 0..len {
        let mut tampered = doc.clone();
        flip_byte_in_binary(&mut tampered, CIPHERTEXT_FIELD, index);
        assert!(
            sealer.authenticate(&tampered).is_err(),
            "flip at byte {} went undetected",
            index
        );
    }
}

#[test]
fn tampered_auth_code_fails() {
    let sealer = users_sealer();
    let (doc, _) = sealed_joe(&sealer);
    for index in [0, 1, 64, 65] {
        let mut tampered = doc.clone();
        flip_byte_in_binary(&mut tampered, AUTH_CODE_FIELD, index);
        assert!(sealer.authenticate(&tampered).is_err());
    }
    let mut garbage = doc.clone();
    garbage.set(AUTH_CODE_FIELD, json!("not binary"));
    assert!(sealer.authenticate(&garbage).is_err());
}

#[test]
fn unsigned_document_fails_by_default() {
    let sealer = users_sealer();
    let doc = joe();
    assert!(matches!(
        sealer.authenticate(&doc),
        Err(SealError::AuthenticationFailed)
    ));
    assert!(!sealer.verify_signature(&doc));
}

#[test]
fn unsigned_document_passes_in_migration_mode() {
    let sealer = Sealer::configure(SealOptions {
        require_authentication_code: false,
        ..SealOptions::with_secret(SECRET).encrypted_fields(["name", "age"])
    })
    .unwrap();
    sealer.authenticate(&joe()).unwrap();

    // a present but invalid code still fails
    let (mut sealed, _) = sealed_joe(&sealer);
    sealed.set("_id", json!("other"));
    assert!(sealer.authenticate(&sealed).is_err());
}

#[test]
fn older_signatures_verify_against_their_own_field_list() {
    let old = users_sealer();
    let (sealed, _) = sealed_joe(&old);

    // schema later starts authenticating another field
    let newer = old
        .reconfigure(
            SealOptions::with_secret(SECRET)
                .encrypted_fields(["name", "age"])
                .authenticated_fields(["email", "role"]),
        )
        .unwrap();
    newer.authenticate(&sealed).unwrap();
}

// ============================================================================
// collection binding
// ============================================================================

#[test]
fn moved_to_other_collection_fails() {
    let sealer = users_sealer();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.set_collection("admins");
    assert!(matches!(
        sealer.authenticate(&doc),
        Err(SealError::AuthenticationFailed)
    ));
}

#[test]
fn collection_id_override_survives_rename() {
    let sealer = Sealer::configure(
        SealOptions::with_secret(SECRET)
            .encrypted_fields(["name", "age"])
            .collection_id("users"),
    )
    .unwrap();
    let (mut doc, _) = sealed_joe(&sealer);
    doc.set_collection("customers");
    sealer.authenticate(&doc).unwrap();

    let mismatched = Sealer::configure(
        SealOptions::with_secret(SECRET)
            .encrypted_fields(["name", "age"])
            .collection_id("customers"),
    )
    .unwrap();
    assert!(mismatched.authenticate(&doc).is_err());
}

// ============================================================================
// composite transforms
// ============================================================================

#[test]
fn save_then_load() {
    let sealer = users_sealer();
    let (mut doc, key) = keyed_joe(&sealer);
    let mut sealed = sealer.save_transform(&mut doc).unwrap();

    // in-memory copy stays readable, persisted copy is sealed
    assert_eq!(doc, joe());
    assert!(!sealed.has_key());
    assert!(sealed.is_encrypted() && sealed.is_signed());
    assert!(sealed.get("name").is_none());

    sealed.register_key(&key).unwrap();
    sealer.load_transform(&mut sealed).unwrap();
    assert_eq!(sealed, joe());
    assert!(!sealed.is_signed());
}

#[test]
fn save_without_decrypt_after_encrypt_leaves_document_sealed() {
    let sealer = Sealer::configure(SealOptions {
        decrypt_after_encrypt: false,
        ..SealOptions::with_secret(SECRET).encrypted_fields(["name", "age"])
    })
    .unwrap();
    let (mut doc, _) = keyed_joe(&sealer);
    let sealed = sealer.save_transform(&mut doc).unwrap();
    assert_eq!(doc, sealed);
    assert!(doc.has_key());
}

#[test]
fn load_refuses_tampered_ciphertext_before_decrypting() {
    let sealer = users_sealer();
    let (mut doc, key) = sealed_joe(&sealer);
    doc.register_key(&key).unwrap();
    flip_byte_in_binary(&mut doc, CIPHERTEXT_FIELD, 20);
    let before = doc.clone();

    assert!(matches!(
        sealer.load_transform(&mut doc),
        Err(SealError::AuthenticationFailed)
    ));
    assert_eq!(doc, before);
    assert!(doc.has_key());
}

#[test]
fn encrypt_everything_by_default() {
    let sealer = Sealer::configure(SealOptions {
        exclude_from_encryption: vec!["email".into()],
        ..SealOptions::with_secret(SECRET)
    })
    .unwrap();
    let (mut doc, key) = keyed_joe(&sealer);
    let mut sealed = sealer.save_transform(&mut doc).unwrap();
    let mut names: Vec<&String> = sealed.fields().keys().collect();
    names.sort();
    assert_eq!(names, vec!["_ac", "_ct", "_id", "email"]);

    sealed.register_key(&key).unwrap();
    sealer.load_transform(&mut sealed).unwrap();
    assert_eq!(sealed, joe());
}

#[test]
fn schema_treatments() {
    let mut options = SealOptions::with_secret(SECRET);
    options.schema.insert("name".into(), FieldTreatment::Encrypted);
    options.schema.insert("email".into(), FieldTreatment::Authenticated);
    options.schema.insert("age".into(), FieldTreatment::Plain);
    let sealer = Sealer::configure(options).unwrap();

    let (mut doc, _) = keyed_joe(&sealer);
    let mut sealed = sealer.save_transform(&mut doc).unwrap();
    assert!(sealed.get("name").is_none());
    assert_eq!(sealed.get("age"), Some(&json!(42)));

    // plain fields may change freely
    sealed.set("age", json!(99));
    sealer.authenticate(&sealed).unwrap();
    sealed.set("email", json!("x@y"));
    assert!(sealer.authenticate(&sealed).is_err());
}

#[test]
fn explicit_keys_and_secret_agree_on_format() {
    let sealer = Sealer::configure(SealOptions::with_keys(
        "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=",
        "AgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAg==",
    ))
    .unwrap();
    let key = sealer.keygen("pw").unwrap();
    let mut doc = joe();
    doc.register_key(&key).unwrap();
    let mut sealed = sealer.save_transform(&mut doc).unwrap();
    sealed.register_key(&key).unwrap();
    sealer.load_transform(&mut sealed).unwrap();
    assert_eq!(sealed, joe());
}

#[test]
fn invalid_configuration_is_reported() {
    let err = Sealer::configure(SealOptions::with_keys("AQID", "AQID")).unwrap_err();
    assert!(matches!(
        err,
        SealError::Crypto(CryptoError::InvalidKeyLength { .. })
    ));
}

#[test]
fn plain_schema_field_cannot_also_be_encrypted() {
    let mut options = SealOptions::with_secret(SECRET).encrypted_fields(["ssn"]);
    options.schema.insert("ssn".into(), FieldTreatment::Plain);
    let err = Sealer::configure(options).unwrap_err();
    assert!(matches!(
        err,
        SealError::Config(ConfigError::ConflictingTreatment(ref f)) if f == "ssn"
    ));
}
