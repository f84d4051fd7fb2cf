//! Properties of the key envelope and the symmetric layer beneath it

use std::collections::HashSet;

use ::common::crypto::{
    generate_wrap_keypair, unwrap, wrap, EnvelopeError, KeyEncoding, KeyEnvelope, SymmetricKey,
    WrapPublicKey,
};
use rand::Rng;

#[test]
fn test_roundtrip_random_messages() {
    let mut rng = rand::rng();
    let (private, public) = generate_wrap_keypair();

    for len in [0usize, 1, 15, 16, 17, 32, 255, 1024, 65536] {
        let mut message = vec![0u8; len];
        rng.fill(&mut message[..]);

        let envelope = wrap(&public, &message).unwrap();
        let recovered = unwrap(&private, &envelope).unwrap();
        assert_eq!(recovered.as_slice(), message.as_slice(), "len {}", len);
    }
}

#[test]
fn test_every_ciphertext_bit_flip_is_detected() {
    let (private, public) = generate_wrap_keypair();
    let envelope = wrap(&public, b"thirty-two bytes of artifact key").unwrap();

    for byte in 0..envelope.ciphertext.len() {
        for bit in 0..8 {
            let mut tampered = envelope.clone();
            tampered.ciphertext[byte] ^= 1 << bit;
            assert!(
                matches!(
                    unwrap(&private, &tampered),
                    Err(EnvelopeError::Authentication)
                ),
                "flip at byte {} bit {} went undetected",
                byte,
                bit
            );
        }
    }
}

#[test]
fn test_every_nonce_bit_flip_is_detected() {
    let (private, public) = generate_wrap_keypair();
    let envelope = wrap(&public, b"secret").unwrap();

    for byte in 0..envelope.nonce.len() {
        for bit in 0..8 {
            let mut tampered = envelope.clone();
            tampered.nonce[byte] ^= 1 << bit;
            assert!(matches!(
                unwrap(&private, &tampered),
                Err(EnvelopeError::Authentication)
            ));
        }
    }
}

#[test]
fn test_random_ephemeral_key_tampering_is_rejected() {
    let mut rng = rand::rng();
    let (private, public) = generate_wrap_keypair();
    let envelope = wrap(&public, b"secret").unwrap();

    for _ in 0..64 {
        let mut raw = *envelope.ephemeral_public_key.as_bytes();
        let byte = rng.random_range(0..raw.len());
        raw[byte] ^= 1 << rng.random_range(0..8u32);

        let mut tampered = envelope.clone();
        tampered.ephemeral_public_key = WrapPublicKey::from_raw(raw).unwrap();
        // A flipped key either lands on a low-order point or derives a different key
        assert!(unwrap(&private, &tampered).is_err());
    }
}

#[test]
fn test_no_nonce_reuse_across_many_encryptions() {
    let key = SymmetricKey::generate();
    let mut nonces = HashSet::with_capacity(10_000);
    for _ in 0..10_000 {
        let sealed = key.encrypt(b"same plaintext every time").unwrap();
        assert!(nonces.insert(sealed.nonce));
    }
}

#[test]
fn test_envelope_survives_both_encodings() {
    let (private, public) = generate_wrap_keypair();
    let key = SymmetricKey::generate();
    let envelope = KeyEnvelope::seal_key(&key, &public).unwrap();

    let from_bytes = KeyEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
    let from_json: KeyEnvelope =
        serde_json::from_str(&serde_json::to_string(&envelope).unwrap()).unwrap();

    assert_eq!(from_bytes.open_key(&private).unwrap(), key);
    assert_eq!(from_json.open_key(&private).unwrap(), key);
}

#[test]
fn test_envelope_of_wrong_length_is_not_a_key() {
    let (private, public) = generate_wrap_keypair();
    let envelope = wrap(&public, &[7u8; 16]).unwrap();
    assert!(matches!(
        envelope.open_key(&private),
        Err(EnvelopeError::KeyFormat(_))
    ));
}
