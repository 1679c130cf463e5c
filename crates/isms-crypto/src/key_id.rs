//! Key identifiers.
//!
//! A key id names everything needed to re-derive its key:
//!
//! ```text
//! {classification}-m{master_version}-{scope}-g{generation}
//! restricted-m1-3fa4c1d09b7e22a5-g2
//! ```
//!
//! `scope` is the first 16 hex characters of SHA-256 over the context the
//! classification keys on: restricted keys are per tenant and purpose,
//! confidential and internal keys are per tenant, public keys are global.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use isms_contracts::{
    classification::Classification,
    error::{IsmsError, IsmsResult},
    package::EncryptionContext,
};

/// Hex characters of the scope digest carried in a key id.
pub const SCOPE_LEN: usize = 16;

/// A parsed key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub classification: Classification,
    pub master_version: u32,
    pub scope: String,
    /// Starts at 1; rotation increments it.
    pub generation: u32,
}

impl KeyId {
    /// The first-generation key for `context` under master secret `master_version`.
    pub fn for_context(context: &EncryptionContext, master_version: u32) -> Self {
        Self {
            classification: context.classification,
            master_version,
            scope: scope_digest(context),
            generation: 1,
        }
    }

    /// The key that replaces this one on rotation.
    pub fn successor(&self) -> Self {
        Self {
            generation: self.generation.saturating_add(1),
            ..self.clone()
        }
    }

    /// Identifies the chain of generations this key belongs to.
    pub fn lineage(&self) -> String {
        format!(
            "{}-m{}-{}",
            self.classification, self.master_version, self.scope
        )
    }

    /// True when this key could have been issued for `context`.
    pub fn matches_context(&self, context: &EncryptionContext) -> bool {
        self.classification == context.classification && self.scope == scope_digest(context)
    }
}

/// Scope digest for `context`.
pub fn scope_digest(context: &EncryptionContext) -> String {
    let material = match context.classification {
        Classification::Restricted => {
            format!("restricted|{}|{}", context.tenant_id, context.purpose)
        }
        Classification::Confidential | Classification::Internal => {
            format!("{}|{}", context.classification, context.tenant_id)
        }
        Classification::Public => "public".to_string(),
    };
    let digest = hex::encode(Sha256::digest(material.as_bytes()));
    digest[..SCOPE_LEN].to_string()
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-m{}-{}-g{}",
            self.classification, self.master_version, self.scope, self.generation
        )
    }
}

impl FromStr for KeyId {
    type Err = IsmsError;

    fn from_str(s: &str) -> IsmsResult<Self> {
        let invalid = |what: &str| IsmsError::Validation {
            reason: format!("malformed key id '{s}': {what}"),
        };

        let parts: Vec<&str> = s.split('-').collect();
        let [classification, master, scope, generation] = parts.as_slice() else {
            return Err(invalid("expected four '-'-separated parts"));
        };

        let classification: Classification = classification.parse()?;
        let master_version = master
            .strip_prefix('m')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| invalid("bad master version"))?;
        if scope.len() != SCOPE_LEN
            || !scope.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid("bad scope digest"));
        }
        let generation = generation
            .strip_prefix('g')
            .and_then(|g| g.parse::<u32>().ok())
            .filter(|g| *g >= 1)
            .ok_or_else(|| invalid("bad generation"))?;

        Ok(Self {
            classification,
            master_version,
            scope: scope.to_string(),
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(classification: Classification, tenant: &str, purpose: &str) -> EncryptionContext {
        EncryptionContext::new(classification, tenant, purpose)
    }

    #[test]
    fn display_parse_round_trip() {
        let id = KeyId::for_context(&ctx(Classification::Restricted, "acme", "payroll"), 3).successor();
        let text = id.to_string();
        assert!(text.starts_with("restricted-m3-"));
        assert!(text.ends_with("-g2"));
        assert_eq!(text.parse::<KeyId>().unwrap(), id);
    }

    #[test]
    fn scope_granularity_follows_classification() {
        let a = |c, t, p| scope_digest(&ctx(c, t, p));

        assert_ne!(
            a(Classification::Restricted, "acme", "payroll"),
            a(Classification::Restricted, "acme", "contracts")
        );
        assert_eq!(
            a(Classification::Confidential, "acme", "payroll"),
            a(Classification::Confidential, "acme", "contracts")
        );
        assert_ne!(
            a(Classification::Confidential, "acme", "x"),
            a(Classification::Internal, "acme", "x")
        );
        assert_ne!(
            a(Classification::Internal, "acme", "x"),
            a(Classification::Internal, "globex", "x")
        );
        assert_eq!(
            a(Classification::Public, "acme", "x"),
            a(Classification::Public, "globex", "y")
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "restricted-m1-0123456789abcdef",
            "secret-m1-0123456789abcdef-g1",
            "public-1-0123456789abcdef-g1",
            "public-m1-0123-g1",
            "public-m1-0123456789ABCDEF-g1",
            "public-m1-0123456789abcdef-g0",
            "public-m1-0123456789abcdef-g1-extra",
        ] {
            assert!(bad.parse::<KeyId>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn matches_context_checks_scope() {
        let payroll = ctx(Classification::Restricted, "acme", "payroll");
        let id = KeyId::for_context(&payroll, 1);
        assert!(id.matches_context(&payroll));
        assert!(!id.matches_context(&ctx(Classification::Restricted, "globex", "payroll")));
        assert!(!id.matches_context(&ctx(Classification::Confidential, "acme", "payroll")));
    }
}
