use crate::model::{EnvironmentGroup, ProfileDefinition, ProfileId};
use anyhow::bail;
use std::collections::{BTreeMap, HashSet};

/// Immutable catalog of known profiles, in configuration order.
#[derive(Clone, Debug)]
pub struct ProfileRegistry {
    profiles: Vec<ProfileDefinition>,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<ProfileDefinition>) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.name.trim().is_empty() {
                bail!("profile name must not be empty");
            }
            if !seen.insert(profile.name.as_str()) {
                bail!("duplicate profile '{}'", profile.name);
            }
        }
        Ok(Self { profiles })
    }

    pub fn default_catalog() -> Vec<ProfileDefinition> {
        vec![
            ProfileDefinition::new("aws-dev-eu", EnvironmentGroup::Dev, "eu-west-1", "Development EU"),
            ProfileDefinition::new(
                "aws-dev-sg",
                EnvironmentGroup::Dev,
                "ap-southeast-1",
                "Development SG",
            ),
            ProfileDefinition::new(
                "kds-ets-np",
                EnvironmentGroup::NonProd,
                "us-east-1",
                "KDS ETS Non-Production",
            ),
            ProfileDefinition::new(
                "kds-gps-np",
                EnvironmentGroup::NonProd,
                "us-east-1",
                "KDS GPS Non-Production",
            ),
            ProfileDefinition::new(
                "kds-iss-np",
                EnvironmentGroup::NonProd,
                "us-east-1",
                "KDS ISS Non-Production",
            ),
            ProfileDefinition::new(
                "kds-ets-pd",
                EnvironmentGroup::Prod,
                "us-east-1",
                "KDS ETS Production",
            ),
            ProfileDefinition::new(
                "kds-gps-pd",
                EnvironmentGroup::Prod,
                "us-east-1",
                "KDS GPS Production",
            ),
            ProfileDefinition::new(
                "kds-iss-pd",
                EnvironmentGroup::Prod,
                "us-east-1",
                "KDS ISS Production",
            ),
        ]
    }

    pub fn get(&self, name: &str) -> Option<&ProfileDefinition> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn group_of(&self, name: &str) -> Option<EnvironmentGroup> {
        self.get(name).map(|profile| profile.group)
    }

    pub fn all(&self) -> &[ProfileDefinition] {
        &self.profiles
    }

    pub fn ids(&self) -> Vec<ProfileId> {
        self.profiles.iter().map(|profile| profile.name.clone()).collect()
    }

    pub fn by_group(&self) -> BTreeMap<EnvironmentGroup, Vec<&ProfileDefinition>> {
        let mut groups: BTreeMap<EnvironmentGroup, Vec<&ProfileDefinition>> = BTreeMap::new();
        for profile in &self.profiles {
            groups.entry(profile.group).or_default().push(profile);
        }
        groups
    }
}
