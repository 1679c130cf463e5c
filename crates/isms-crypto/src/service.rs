//! `EncryptionService`: classification-driven AES-256-GCM with access gating,
//! soft key rotation, and retirement.

use std::path::Path;
use std::sync::Arc;

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    event::SecurityEvent,
    package::{
        AccessContext, EncryptedPackage, EncryptionContext, RotatedKey, RotationFailure,
        RotationReport, ALGORITHM_AES_256_GCM,
    },
};
use isms_core::traits::{MasterSecretProvider, SecurityEventSink};
use isms_policy::{config::MIN_KDF_ITERATIONS, AccessPolicy, AccessVerdict, KeyPolicy};

use crate::kdf::{DerivedKey, KeyCache};
use crate::key_id::KeyId;
use crate::registry::{ActiveKey, KeyRegistry};

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Resource type recorded for payload events.
pub const PAYLOAD_RESOURCE: &str = "encrypted_payload";

/// Encrypts and decrypts payloads under keys derived from the master secret.
///
/// Key ids are deterministic per classification scope, so a package carries
/// everything needed to decrypt it except the master secret.
pub struct EncryptionService {
    secrets: Arc<dyn MasterSecretProvider>,
    keys: KeyPolicy,
    access: AccessPolicy,
    cache: KeyCache,
    registry: KeyRegistry,
    events: Option<Arc<dyn SecurityEventSink>>,
}

impl EncryptionService {
    /// Without an event sink (see [`with_event_sink`](Self::with_event_sink))
    /// decryptions, access denials and key lifecycle changes are only
    /// logged through `tracing`, not recorded in the audit ledger.
    ///
    /// # Errors
    ///
    /// `ConfigError` if `keys.kdf_iterations` is below the minimum or the
    /// rotation period is zero.
    pub fn new(
        secrets: Arc<dyn MasterSecretProvider>,
        keys: KeyPolicy,
        access: AccessPolicy,
    ) -> IsmsResult<Self> {
        if keys.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(IsmsError::ConfigError {
                reason: format!(
                    "kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                    keys.kdf_iterations
                ),
            });
        }
        if keys.rotation_period_days == 0 {
            return Err(IsmsError::ConfigError {
                reason: "rotation_period_days must be positive".to_string(),
            });
        }
        Ok(Self {
            secrets,
            cache: KeyCache::new(keys.kdf_iterations),
            keys,
            access,
            registry: KeyRegistry::new(),
            events: None,
        })
    }

    /// Record decryptions, denials, rotations and retirements through `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Encrypt `plaintext` under the active key for `context`.
    pub fn encrypt(&self, plaintext: &[u8], context: &EncryptionContext) -> IsmsResult<EncryptedPackage> {
        validate_context(context)?;

        let master = self.secrets.current()?;
        let key_id = self
            .registry
            .active_for(context, master.version(), Utc::now(), |id| self.keys.is_retired(id))?;
        let key = self.cache.get(&key_id, self.secrets.as_ref())?;
        let cipher = cipher_for(&key)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key_id = key_id.to_string();
        let aad = associated_data(&key_id, context);
        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), aad.as_bytes(), &mut ciphertext)
            .map_err(|e| IsmsError::Crypto {
                reason: format!("encryption failed: {e}"),
            })?;

        let auth_tag = tag.to_vec();
        let integrity_hash = payload_hash(&ciphertext, &auth_tag, &nonce);

        debug!(
            key_id = %key_id,
            classification = %context.classification,
            tenant_id = %context.tenant_id,
            bytes = plaintext.len(),
            "payload encrypted"
        );

        Ok(EncryptedPackage {
            ciphertext,
            key_id,
            auth_tag,
            iv: nonce.to_vec(),
            algorithm: ALGORITHM_AES_256_GCM.to_string(),
            encrypted_at: Utc::now(),
            classification: context.classification,
            tenant_id: context.tenant_id.clone(),
            purpose: context.purpose.clone(),
            integrity_hash,
        })
    }

    /// Decrypt `package` on behalf of `access`.
    ///
    /// Checks run in order, and the first failure is returned:
    ///
    /// 1. package shape (`Validation`)
    /// 2. role and tenant gate (`AccessDenied`, recorded as `access_denied`)
    /// 3. retired key (`KeyExpired`)
    /// 4. `ciphertext ‖ tag ‖ iv` hash (`Integrity`)
    /// 5. AEAD open (`Integrity`)
    ///
    /// With an event sink attached the decryption is recorded before the
    /// plaintext is returned; if that write fails, no plaintext is released.
    pub fn decrypt(&self, package: &EncryptedPackage, access: &AccessContext) -> IsmsResult<Vec<u8>> {
        let key_id = validate_package(package)?;

        let same_tenant = access.tenant_id == package.tenant_id;
        if let AccessVerdict::Deny { reason } =
            self.access
                .authorize(&access.actor_role, package.classification, same_tenant)
        {
            warn!(
                actor_id = %access.actor_id,
                actor_role = %access.actor_role,
                key_id = %package.key_id,
                reason = %reason,
                "decryption denied"
            );
            self.record_denial(package, access, &reason);
            return Err(IsmsError::AccessDenied { reason });
        }

        if self.is_retired(&package.key_id)? {
            return Err(IsmsError::KeyExpired {
                key_id: package.key_id.clone(),
            });
        }

        let expected = payload_hash(&package.ciphertext, &package.auth_tag, &package.iv);
        if expected != package.integrity_hash {
            return Err(IsmsError::Integrity {
                reason: format!("payload hash mismatch for key '{}'", package.key_id),
            });
        }

        let key = self.cache.get(&key_id, self.secrets.as_ref())?;
        let cipher = cipher_for(&key)?;
        let context = EncryptionContext::new(
            package.classification,
            package.tenant_id.clone(),
            package.purpose.clone(),
        );
        let aad = associated_data(&package.key_id, &context);

        let mut plaintext = package.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&package.iv),
                aad.as_bytes(),
                &mut plaintext,
                Tag::from_slice(&package.auth_tag),
            )
            .map_err(|_| IsmsError::Integrity {
                reason: format!("authentication failed for key '{}'", package.key_id),
            })?;

        if let Some(sink) = &self.events {
            sink.record(
                SecurityEvent::new(
                    "decryption",
                    access.actor_id.as_str(),
                    package.tenant_id.as_str(),
                    PAYLOAD_RESOURCE,
                    package.integrity_hash.as_str(),
                    "decrypt",
                )
                .with_detail("key_id", json!(package.key_id))
                .with_detail("classification", json!(package.classification))
                .with_detail("actor_role", json!(access.actor_role))
                .with_detail("actor_tenant", json!(access.tenant_id)),
            )
            .map_err(|e| IsmsError::AuditWriteFailed {
                reason: format!("decryption not recorded: {e}"),
            })?;
        }

        debug!(
            key_id = %package.key_id,
            actor_id = %access.actor_id,
            bytes = plaintext.len(),
            "payload decrypted"
        );
        Ok(plaintext)
    }

    /// Rotate every active key older than the rotation period.
    ///
    /// Active generations and their issue times live in memory only. After
    /// a restart every lineage starts again at generation 1, issued at first
    /// use, so a process restarted more often than the rotation period never
    /// rotates.
    pub fn rotate_keys(&self) -> RotationReport {
        self.rotate_keys_at(Utc::now())
    }

    /// Rotation as of `now`.
    ///
    /// Rotation is soft: the successor takes over new writes and previous
    /// generations stay decryptable until retired. Existing payloads are
    /// not re-encrypted; decrypting and encrypting again moves one to the
    /// successor. A rotation the event sink refuses is rolled back and
    /// listed under `errors`; keys listed under `rotated` are the ones now
    /// active.
    pub fn rotate_keys_at(&self, now: DateTime<Utc>) -> RotationReport {
        let mut report = RotationReport::default();

        let due = match self.registry.due_for_rotation(now, self.keys.rotation_period()) {
            Ok(due) => due,
            Err(e) => {
                report.errors.push(RotationFailure {
                    key_id: "*".to_string(),
                    reason: e.to_string(),
                });
                return report;
            }
        };
        report.checked = self.registry.active_keys().map_or(due.len(), |keys| keys.len());

        for previous in due {
            match self.rotate_one(&previous, now) {
                Ok(Some(rotated)) => report.rotated.push(rotated),
                Ok(None) => {}
                Err(e) => {
                    warn!(key_id = %previous, error = %e, "key rotation failed");
                    report.errors.push(RotationFailure {
                        key_id: previous.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            checked = report.checked,
            rotated = report.rotated.len(),
            errors = report.errors.len(),
            "key rotation run finished"
        );
        report
    }

    /// Retire `key_id`: payloads under it can no longer be decrypted. If it
    /// is the active key for its scope, new writes move to the next
    /// generation.
    pub fn retire_key(&self, key_id: &str) -> IsmsResult<()> {
        let parsed: KeyId = key_id.parse()?;
        let newly = self.registry.retire(&parsed, Utc::now())?;
        if newly {
            info!(key_id = %key_id, "key retired");
            self.record_key_event("retire", &parsed, json!({}))?;
        }
        Ok(())
    }

    /// True when `key_id` is retired by policy or at runtime.
    pub fn is_retired(&self, key_id: &str) -> IsmsResult<bool> {
        Ok(self.keys.is_retired(key_id) || self.registry.is_retired(key_id)?)
    }

    /// The id new payloads for `context` would be encrypted under.
    pub fn active_key_id(&self, context: &EncryptionContext) -> IsmsResult<String> {
        validate_context(context)?;
        let master = self.secrets.current()?;
        self.registry
            .active_for(context, master.version(), Utc::now(), |id| self.keys.is_retired(id))
            .map(|id| id.to_string())
    }

    /// Every lineage's active key.
    pub fn active_keys(&self) -> IsmsResult<Vec<ActiveKey>> {
        self.registry.active_keys()
    }

    /// Number of key derivations performed since start-up.
    pub fn derivations(&self) -> usize {
        self.cache.derivations()
    }

    /// Encrypt the file at `source` and write the package as JSON to
    /// `destination`.
    pub fn encrypt_file(
        &self,
        source: &Path,
        destination: &Path,
        context: &EncryptionContext,
    ) -> IsmsResult<EncryptedPackage> {
        let plaintext = Zeroizing::new(std::fs::read(source).map_err(|e| io_error("read", source, e))?);
        let package = self.encrypt(&plaintext, context)?;
        let encoded = serde_json::to_vec_pretty(&package)?;
        std::fs::write(destination, encoded).map_err(|e| io_error("write", destination, e))?;
        info!(
            source = %source.display(),
            destination = %destination.display(),
            key_id = %package.key_id,
            "file encrypted"
        );
        Ok(package)
    }

    /// Decrypt the JSON package at `source` and write the plaintext to
    /// `destination`. Nothing is written if decryption fails.
    pub fn decrypt_file(&self, source: &Path, destination: &Path, access: &AccessContext) -> IsmsResult<()> {
        let encoded = std::fs::read(source).map_err(|e| io_error("read", source, e))?;
        let package: EncryptedPackage = serde_json::from_slice(&encoded)?;
        let plaintext = Zeroizing::new(self.decrypt(&package, access)?);
        std::fs::write(destination, plaintext.as_slice()).map_err(|e| io_error("write", destination, e))?;
        info!(
            source = %source.display(),
            destination = %destination.display(),
            actor_id = %access.actor_id,
            "file decrypted"
        );
        Ok(())
    }

    fn rotate_one(&self, previous: &KeyId, now: DateTime<Utc>) -> IsmsResult<Option<RotatedKey>> {
        let mut successor = previous.successor();
        while self.is_retired(&successor.to_string())? {
            successor = successor.successor();
        }
        // Warm the cache so a missing master version fails here rather than
        // on the first write.
        self.cache.get(&successor, self.secrets.as_ref())?;

        let Some(issued_at) = self.registry.issued_at(previous)? else {
            debug!(key_id = %previous, "key already rotated");
            return Ok(None);
        };
        if !self.registry.promote(previous, &successor, now)? {
            debug!(key_id = %previous, "key already rotated");
            return Ok(None);
        }

        // An unrecorded rotation is undone; the previous key stays active.
        if let Err(e) = self.record_key_event(
            "rotate",
            previous,
            json!({ "successor": successor.to_string() }),
        ) {
            self.registry.promote(&successor, previous, issued_at)?;
            warn!(previous = %previous, successor = %successor, "key rotation rolled back");
            return Err(e);
        }
        info!(previous = %previous, successor = %successor, "key rotated");

        Ok(Some(RotatedKey {
            previous: previous.to_string(),
            successor: successor.to_string(),
        }))
    }

    fn record_key_event(&self, action: &str, key_id: &KeyId, details: serde_json::Value) -> IsmsResult<()> {
        let Some(sink) = &self.events else {
            return Ok(());
        };
        let mut event = SecurityEvent::new(
            "key_rotation",
            "key_manager",
            "system",
            "encryption_key",
            key_id.to_string(),
            action,
        )
        .with_detail("classification", json!(key_id.classification))
        .with_detail("master_version", json!(key_id.master_version));
        if let serde_json::Value::Object(extra) = details {
            event.details.extend(extra);
        }
        sink.record(event).map_err(|e| IsmsError::AuditWriteFailed {
            reason: format!("key {action} not recorded: {e}"),
        })?;
        Ok(())
    }

    fn record_denial(&self, package: &EncryptedPackage, access: &AccessContext, reason: &str) {
        let Some(sink) = &self.events else {
            return;
        };
        let event = SecurityEvent::new(
            "access_denied",
            access.actor_id.as_str(),
            package.tenant_id.as_str(),
            PAYLOAD_RESOURCE,
            package.integrity_hash.as_str(),
            "access_denied",
        )
        .with_detail("key_id", json!(package.key_id))
        .with_detail("classification", json!(package.classification))
        .with_detail("actor_role", json!(access.actor_role))
        .with_detail("actor_tenant", json!(access.tenant_id))
        .with_detail("reason", json!(reason));

        if let Err(e) = sink.record(event) {
            warn!(actor_id = %access.actor_id, error = %e, "access denial not recorded");
        }
    }
}

fn validate_context(context: &EncryptionContext) -> IsmsResult<()> {
    if context.tenant_id.trim().is_empty() {
        return Err(IsmsError::Validation {
            reason: "encryption context requires a tenant_id".to_string(),
        });
    }
    if context.purpose.trim().is_empty() {
        return Err(IsmsError::Validation {
            reason: "encryption context requires a purpose".to_string(),
        });
    }
    Ok(())
}

/// Structural checks that need no key material.
fn validate_package(package: &EncryptedPackage) -> IsmsResult<KeyId> {
    let invalid = |reason: String| IsmsError::Validation { reason };

    if package.algorithm != ALGORITHM_AES_256_GCM {
        return Err(invalid(format!("unsupported algorithm '{}'", package.algorithm)));
    }
    if package.iv.len() != NONCE_LEN {
        return Err(invalid(format!("iv must be {NONCE_LEN} bytes, got {}", package.iv.len())));
    }
    if package.auth_tag.len() != TAG_LEN {
        return Err(invalid(format!(
            "auth_tag must be {TAG_LEN} bytes, got {}",
            package.auth_tag.len()
        )));
    }
    if package.integrity_hash.len() != 64 || hex::decode(&package.integrity_hash).is_err() {
        return Err(invalid("integrity_hash must be 64 hex characters".to_string()));
    }

    let key_id: KeyId = package.key_id.parse()?;
    let context = EncryptionContext::new(
        package.classification,
        package.tenant_id.clone(),
        package.purpose.clone(),
    );
    if !key_id.matches_context(&context) {
        return Err(invalid(format!(
            "key '{}' was not issued for this package's classification and scope",
            package.key_id
        )));
    }
    Ok(key_id)
}

fn cipher_for(key: &DerivedKey) -> IsmsResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(&key[..]).map_err(|e| IsmsError::Crypto {
        reason: format!("failed to create cipher: {e}"),
    })
}

fn associated_data(key_id: &str, context: &EncryptionContext) -> String {
    format!(
        "{}|{}|{}|{}",
        key_id, context.classification, context.tenant_id, context.purpose
    )
}

/// SHA-256 hex over `ciphertext ‖ auth_tag ‖ iv`.
pub fn payload_hash(ciphertext: &[u8], auth_tag: &[u8], iv: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ciphertext);
    hasher.update(auth_tag);
    hasher.update(iv);
    hex::encode(hasher.finalize())
}

fn io_error(op: &str, path: &Path, e: std::io::Error) -> IsmsError {
    IsmsError::Collaborator {
        reason: format!("failed to {op} {}: {e}", path.display()),
        retryable: false,
    }
}
