//! In-memory collaborators: an asset registry and an assessment store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};

use isms_contracts::{
    error::{IsmsError, IsmsResult},
    risk::{Asset, RiskAssessment},
};
use isms_core::traits::{AssessmentStore, AssetRegistry};

/// Assets keyed by `(tenant_id, asset_id)`.
#[derive(Debug, Default)]
pub struct StaticAssetRegistry {
    assets: RwLock<HashMap<(String, String), Asset>>,
}

impl StaticAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let registry = Self::new();
        if let Ok(mut map) = registry.assets.write() {
            for asset in assets {
                map.insert((asset.tenant_id.clone(), asset.asset_id.clone()), asset);
            }
        }
        registry
    }

    /// Add or replace an asset.
    pub fn upsert(&self, asset: Asset) -> IsmsResult<()> {
        self.assets
            .write()
            .map_err(|_| poisoned("asset registry"))?
            .insert((asset.tenant_id.clone(), asset.asset_id.clone()), asset);
        Ok(())
    }

    /// Ids of every asset registered for `tenant_id`, sorted.
    pub fn asset_ids(&self, tenant_id: &str) -> IsmsResult<Vec<String>> {
        let assets = self.assets.read().map_err(|_| poisoned("asset registry"))?;
        let mut ids: Vec<String> = assets
            .keys()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl AssetRegistry for StaticAssetRegistry {
    fn get_asset(&self, asset_id: &str, tenant_id: &str) -> IsmsResult<Option<Asset>> {
        let assets = self.assets.read().map_err(|_| poisoned("asset registry"))?;
        Ok(assets
            .get(&(tenant_id.to_string(), asset_id.to_string()))
            .cloned())
    }
}

/// Append-only assessment history.
#[derive(Debug, Default)]
pub struct InMemoryAssessmentStore {
    assessments: Mutex<Vec<RiskAssessment>>,
}

impl InMemoryAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> IsmsResult<MutexGuard<'_, Vec<RiskAssessment>>> {
        self.assessments.lock().map_err(|_| poisoned("assessment store"))
    }
}

impl AssessmentStore for InMemoryAssessmentStore {
    fn append(&self, assessment: &RiskAssessment) -> IsmsResult<()> {
        self.lock()?.push(assessment.clone());
        Ok(())
    }

    fn history(&self, tenant_id: &str, asset_id: &str) -> IsmsResult<Vec<RiskAssessment>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.asset_id == asset_id)
            .cloned()
            .collect())
    }

    fn latest_per_asset(&self, tenant_id: &str) -> IsmsResult<Vec<RiskAssessment>> {
        let assessments = self.lock()?;
        let mut latest: BTreeMap<&str, &RiskAssessment> = BTreeMap::new();
        for assessment in assessments.iter().filter(|a| a.tenant_id == tenant_id) {
            match latest.get(assessment.asset_id.as_str()) {
                Some(current) if current.assessed_at > assessment.assessed_at => {}
                _ => {
                    latest.insert(&assessment.asset_id, assessment);
                }
            }
        }
        Ok(latest.into_values().cloned().collect())
    }
}

fn poisoned(what: &str) -> IsmsError {
    IsmsError::Collaborator {
        reason: format!("{what} lock poisoned"),
        retryable: false,
    }
}
