use crate::credentials::{CredentialKind, CredentialStatus, classify, summarize};
use crate::error::ValidatorError;
use crate::model::ProfileId;
use crate::provider::CredentialStore;
use crate::registry::ProfileRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub results: BTreeMap<ProfileId, CredentialStatus>,
    pub summary: BTreeMap<CredentialKind, usize>,
}

impl ValidationReport {
    fn from_results(results: BTreeMap<ProfileId, CredentialStatus>) -> Self {
        let summary = summarize(results.values());
        Self { results, summary }
    }

    /// Report used when the store itself failed: every profile is `unknown`.
    pub fn unavailable(profiles: &[ProfileId], reason: &str) -> Self {
        let results = profiles
            .iter()
            .map(|profile| (profile.clone(), CredentialStatus::unknown(profile, reason)))
            .collect();
        Self::from_results(results)
    }
}

/// Classifies stored session material per profile. Stateless apart from the
/// store handle, so concurrent calls are safe.
#[derive(Clone)]
pub struct CredentialValidator {
    registry: Arc<ProfileRegistry>,
    store: Arc<dyn CredentialStore>,
}

impl CredentialValidator {
    pub fn new(registry: Arc<ProfileRegistry>, store: Arc<dyn CredentialStore>) -> Self {
        Self { registry, store }
    }

    pub fn validate(&self, profiles: &[ProfileId]) -> Result<ValidationReport, ValidatorError> {
        self.validate_at(profiles, OffsetDateTime::now_utc())
    }

    pub fn validate_at(
        &self,
        profiles: &[ProfileId],
        now: OffsetDateTime,
    ) -> Result<ValidationReport, ValidatorError> {
        let targets = self.resolve_targets(profiles);
        let mut results = BTreeMap::new();
        for profile in targets {
            let raw = self
                .store
                .load(&profile)
                .map_err(ValidatorError::StorageUnavailable)?;
            let status = classify(&profile, raw.as_ref(), now);
            debug!(profile = %profile, status = %status.status, "credential status");
            results.insert(profile, status);
        }
        Ok(ValidationReport::from_results(results))
    }

    /// Same as `validate` but a store failure yields `unknown` entries.
    pub fn validate_or_unknown(&self, profiles: &[ProfileId]) -> ValidationReport {
        match self.validate(profiles) {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "credential validation failed");
                ValidationReport::unavailable(&self.resolve_targets(profiles), &err.to_string())
            }
        }
    }

    /// Empty input means every known profile; unknown ids are dropped.
    pub fn resolve_targets(&self, profiles: &[ProfileId]) -> Vec<ProfileId> {
        if profiles.is_empty() {
            return self.registry.ids();
        }
        let mut targets = Vec::new();
        for profile in profiles {
            if !self.registry.contains(profile) {
                warn!(profile = %profile, "ignoring unknown profile in validation request");
                continue;
            }
            if !targets.contains(profile) {
                targets.push(profile.clone());
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryCredentialStore, test_registry};
    use time::macros::datetime;

    fn validator(store: MemoryCredentialStore) -> CredentialValidator {
        CredentialValidator::new(Arc::new(test_registry()), Arc::new(store))
    }

    #[test]
    fn empty_request_covers_all_profiles() {
        let store = MemoryCredentialStore::default();
        store.put_long_term("dev-1");
        let report = validator(store).validate(&[]).unwrap();
        assert_eq!(report.results.len(), test_registry().ids().len());
        assert_eq!(report.results["dev-1"].status, CredentialKind::Valid);
        assert_eq!(report.results["prod-1"].status, CredentialKind::Missing);
        assert_eq!(report.summary[&CredentialKind::Valid], 1);
    }

    #[test]
    fn unknown_profiles_are_ignored() {
        let report = validator(MemoryCredentialStore::default())
            .validate(&["ghost".into(), "dev-2".into(), "dev-2".into()])
            .unwrap();
        assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["dev-2"]);
    }

    #[test]
    fn repeated_validation_is_stable() {
        let store = MemoryCredentialStore::default();
        store.put_session("np-1", "2030-01-01T00:00:00Z");
        let validator = validator(store);
        let now = datetime!(2029-06-01 00:00 UTC);
        let first = validator.validate_at(&["np-1".into()], now).unwrap();
        let second = validator.validate_at(&["np-1".into()], now).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.results["np-1"].status, CredentialKind::Valid);
    }

    #[test]
    fn store_failure_becomes_unknown() {
        let store = MemoryCredentialStore::default();
        store.fail_with("locked");
        let validator = validator(store);
        assert!(matches!(
            validator.validate(&[]),
            Err(ValidatorError::StorageUnavailable(_))
        ));
        let report = validator.validate_or_unknown(&["dev-1".into()]);
        assert_eq!(report.results["dev-1"].status, CredentialKind::Unknown);
        assert_eq!(report.summary[&CredentialKind::Unknown], 1);
    }
}
