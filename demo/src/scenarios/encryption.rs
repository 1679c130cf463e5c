//! Scenario 2: Encryption
//!
//! Encrypts a restricted patient record and shows three things:
//!
//! Sub-case A: the role matrix decides who may read it back
//! Sub-case B: rotation moves new writes to a successor key while the old
//!             payload stays readable, until its key is retired
//! Sub-case C: a master secret rollover issues keys under the new version

use std::sync::Arc;

use chrono::{Duration, Utc};

use isms_audit::AuditTrail;
use isms_contracts::{
    classification::Classification,
    error::{IsmsError, IsmsResult},
    package::{AccessContext, EncryptionContext},
    secret::MasterSecret,
};
use isms_crypto::{EncryptionService, StaticKeyring};
use isms_policy::PolicyConfig;

use crate::mock_data::{MASTER_SECRET_V1, MASTER_SECRET_V2, TENANT};

const RECORD: &[u8] = br#"{"patient":"P-20931","diagnosis":"hypertension","mrn":"884-22-1093"}"#;

pub fn run_scenario(policy: &PolicyConfig, ledger: Option<Arc<AuditTrail>>) -> IsmsResult<()> {
    println!("=== Scenario 2: Encryption ===");
    println!();

    let keyring = StaticKeyring::new(MasterSecret::new(1, MASTER_SECRET_V1.to_vec())?);
    let mut service =
        EncryptionService::new(Arc::new(keyring), policy.keys.clone(), policy.access.clone())?;
    if let Some(trail) = &ledger {
        service = service.with_event_sink(trail.clone());
    }

    let context = EncryptionContext::new(Classification::Restricted, TENANT, "patient_record");
    let package = service.encrypt(RECORD, &context)?;
    println!("  Encrypted {} bytes as {}", RECORD.len(), package.algorithm);
    println!("  Key id:   {}", package.key_id);
    println!("  Hash:     {}..", &package.integrity_hash[..16]);
    println!();

    // ── Sub-case A: access gate ──────────────────────────────────────────────

    println!("  --- Sub-case A: role matrix ---");
    let readers = [
        AccessContext::new("dana", "auditor", TENANT),
        AccessContext::new("erin", "analyst", TENANT),
        AccessContext::new("frank", "admin", "globex"),
        AccessContext::new("gus", "system", "globex"),
    ];
    for reader in &readers {
        let outcome = match service.decrypt(&package, reader) {
            Ok(plaintext) => format!("ALLOWED ({} bytes)", plaintext.len()),
            Err(IsmsError::AccessDenied { reason }) => format!("DENIED ({reason})"),
            Err(e) => return Err(e),
        };
        println!(
            "  {:<6} role {:<8} tenant {:<12} {}",
            reader.actor_id, reader.actor_role, reader.tenant_id, outcome
        );
    }
    println!();

    // ── Sub-case B: rotation and retirement ──────────────────────────────────

    println!("  --- Sub-case B: rotation ---");
    let later = Utc::now() + policy.keys.rotation_period() + Duration::days(1);
    let report = service.rotate_keys_at(later);
    for rotated in &report.rotated {
        println!("  Rotated {} -> {}", rotated.previous, rotated.successor);
    }
    for failure in &report.errors {
        println!("  Rotation failed for {}: {}", failure.key_id, failure.reason);
    }

    let auditor = &readers[0];
    let fresh = service.encrypt(RECORD, &context)?;
    println!("  New writes use        {}", fresh.key_id);
    println!(
        "  Old payload readable: {}",
        service.decrypt(&package, auditor).is_ok()
    );

    service.retire_key(&package.key_id)?;
    match service.decrypt(&package, auditor) {
        Err(IsmsError::KeyExpired { key_id }) => {
            println!("  After retiring {key_id}: old payload rejected (KeyExpired)")
        }
        Ok(_) => println!("  After retirement: old payload unexpectedly readable"),
        Err(e) => return Err(e),
    }
    println!(
        "  Successor payload readable: {}",
        service.decrypt(&fresh, auditor).is_ok()
    );
    println!();

    // ── Sub-case C: master rollover ──────────────────────────────────────────

    println!("  --- Sub-case C: master secret rollover ---");
    let keyring = StaticKeyring::new(MasterSecret::new(1, MASTER_SECRET_V1.to_vec())?)
        .with_secret(MasterSecret::new(2, MASTER_SECRET_V2.to_vec())?)?;
    let rolled = EncryptionService::new(Arc::new(keyring), policy.keys.clone(), policy.access.clone())?;
    let rewritten = rolled.encrypt(RECORD, &context)?;
    println!("  New writes use        {}", rewritten.key_id);
    println!(
        "  v1 payload under v2 keyring readable: {}",
        rolled.decrypt(&fresh, auditor).is_ok()
    );
    println!("  Keys derived so far:  {}", service.derivations() + rolled.derivations());
    println!();
    Ok(())
}
