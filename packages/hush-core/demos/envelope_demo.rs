//! # Envelope Demo
//!
//! Seals a message for a recipient, opens it, shows the encapsulation
//! fallback, and demonstrates tamper detection.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=hush_core=debug cargo run --release --example envelope_demo
//! ```

use hush_core::crypto::diagnostics::{measure_confusion, measure_diffusion};
use hush_core::crypto::{to_hex, IdentityKeys, MessageKey, Nonce};
use hush_core::{MessageEnvelope, Recipient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Hush Core: Envelope Demo ===\n");

    // Step 1: Identities
    println!("Step 1: Generating identities for Alice and Bob (RSA-4096, takes a moment)...");

    let alice = IdentityKeys::generate().expect("Failed to generate Alice's keys");
    let bob = IdentityKeys::generate().expect("Failed to generate Bob's keys");

    println!("  Alice fingerprint: {}", alice.fingerprint().expect("fingerprint"));
    println!("  Bob fingerprint:   {}", bob.fingerprint().expect("fingerprint"));
    println!();

    // Step 2: Seal
    println!("Step 2: Alice seals a message for Bob...");

    let bob_agreement = bob.agreement.export_public();
    let recipient = Recipient {
        agreement: Some(&bob_agreement),
        encapsulation: Some(bob.encapsulation.public_key()),
    };

    let message = b"Hello Bob! This is a secret message from Alice.";
    let envelope =
        MessageEnvelope::seal(message, &alice.agreement, &recipient).expect("Seal failed");

    println!("  Plaintext: \"{}\"", String::from_utf8_lossy(message));
    println!("  Wrap algorithm: {}", envelope.wrap_algorithm);
    println!(
        "  Ciphertext length: {} bytes (plaintext: {} bytes)",
        envelope.ciphertext.len(),
        message.len()
    );
    println!("  Wrapped key length: {} bytes", envelope.wrapped_key.len());
    println!("  Integrity hash: {}", envelope.integrity_hash);
    println!();

    // Step 3: Open
    println!("Step 3: Bob opens the envelope...");

    let alice_agreement = alice.agreement.export_public();
    let wire = envelope.to_json().expect("Serialize failed");
    let received = MessageEnvelope::from_json(&wire).expect("Parse failed");
    let opened = received
        .open(&bob, Some(&alice_agreement))
        .expect("Open failed");

    println!("  Decrypted: \"{}\"", String::from_utf8_lossy(&opened));
    if opened == message {
        println!("  [OK] Message opened successfully!");
    } else {
        println!("  [FAILED] Opened the wrong plaintext!");
    }
    println!();

    // Step 4: Fallback
    println!("Step 4: Bob's published agreement key is malformed...");
    println!();
    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                    WRAP SELECTION                           │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │   agreement(alice_p256, bob_p256_pub)                       │");
    println!("  │        │                                                    │");
    println!("  │        ├── ok ────────────► wrap_algorithm = agreement      │");
    println!("  │        │                                                    │");
    println!("  │        └── key error ─────► RSA-OAEP(bob_rsa_pub)           │");
    println!("  │                             wrap_algorithm = encapsulation  │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    let mut broken = bob_agreement.clone();
    broken.x = Some("broken".into());
    let degraded = Recipient {
        agreement: Some(&broken),
        encapsulation: Some(bob.encapsulation.public_key()),
    };
    let fallback =
        MessageEnvelope::seal(message, &alice.agreement, &degraded).expect("Seal failed");

    println!("  Wrap algorithm: {}", fallback.wrap_algorithm);
    println!("  Wrapped key length: {} bytes", fallback.wrapped_key.len());
    match fallback.open(&bob, None) {
        Ok(pt) if pt == message => println!("  [OK] Bob opened the fallback envelope!"),
        Ok(_) => println!("  [FAILED] Fallback produced the wrong plaintext!"),
        Err(e) => println!("  [FAILED] Fallback envelope rejected: {}", e),
    }
    println!();

    // Step 5: Tampering
    println!("Step 5: Tamper detection...");

    let mut tampered = envelope.clone();
    tampered.ciphertext[0] ^= 0xFF;

    let report = tampered.open_report(&bob, Some(&alice_agreement));
    println!("  Integrity hash matches: {}", report.integrity_ok);
    println!("  Payload decryptable:    {}", report.decryptable());
    match report.into_result() {
        Ok(_) => println!("  [FAILED] Tampered envelope was accepted!"),
        Err(e) => println!("  [OK] Tampered envelope rejected: {}", e),
    }
    println!();

    // Step 6: Statistical self-test
    println!("Step 6: Primitive self-test...");

    let plaintext = b"attack at dawn, bring cake";
    let nonce = Nonce::from_bytes([0u8; 12]);
    let key_a = MessageKey::generate().expect("key");
    let key_b = MessageKey::generate().expect("key");

    let confusion = measure_confusion(plaintext, key_a.as_bytes(), key_b.as_bytes(), &nonce)
        .expect("confusion");
    let diffusion = measure_diffusion(plaintext, 0, key_a.as_bytes(), &nonce).expect("diffusion");

    println!("  Confusion: {:.1}% of ciphertext bits differ", confusion * 100.0);
    println!("  Diffusion: {:.1}% of tag + digest bits differ", diffusion * 100.0);
    println!("  Nonce: {}", to_hex(nonce.as_bytes()));
    println!();

    println!("=== Demo Complete ===");
}
