//! # Backup Demo
//!
//! Seals an identity under a passphrase, exports it, and restores it.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=hush_core=debug cargo run --release --example backup_demo
//! ```

use hush_core::backup::MIN_BACKUP_ITERATIONS;
use hush_core::{IdentityKeys, SealedBackup};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Hush Core: Backup Demo ===\n");

    // Step 1: Identity
    println!("Step 1: Generating an identity off the async runtime...");

    let keys = IdentityKeys::generate_off_thread()
        .await
        .expect("Failed to generate keys");
    let fingerprint = keys.fingerprint().expect("fingerprint");
    println!("  Fingerprint: {}", fingerprint);
    println!();

    // Step 2: Seal
    println!("Step 2: Sealing the private keys under a passphrase...");

    let passphrase = Zeroizing::new("purple monkey dishwasher".to_string());
    let backup = SealedBackup::seal_off_thread(
        keys.to_bundle(),
        passphrase.clone(),
        MIN_BACKUP_ITERATIONS,
    )
    .await
    .expect("Seal failed");

    let exported = backup.to_json().expect("Export failed");
    println!("  Version: {}", backup.version);
    println!("  PBKDF2 iterations: {}", backup.iterations);
    println!("  Exported size: {} bytes", exported.len());
    println!();

    // Step 3: Wrong passphrase
    println!("Step 3: Restoring with the wrong passphrase...");

    let imported = SealedBackup::from_json(&exported).expect("Import failed");
    match imported
        .clone()
        .restore_off_thread(Zeroizing::new("purple monkey dishwashers".to_string()))
        .await
    {
        Ok(_) => println!("  [FAILED] Wrong passphrase was accepted!"),
        Err(e) => println!("  [OK] Rejected: {}", e),
    }
    println!();

    // Step 4: Restore
    println!("Step 4: Restoring with the right passphrase...");

    let restored = imported
        .restore_off_thread(passphrase)
        .await
        .expect("Restore failed");
    let restored_fingerprint = restored.fingerprint().expect("fingerprint");
    println!("  Fingerprint: {}", restored_fingerprint);

    if restored_fingerprint == fingerprint {
        println!("  [OK] Identity restored!");
    } else {
        println!("  [FAILED] Restored a different identity!");
    }
    println!();

    println!("=== Demo Complete ===");
}
