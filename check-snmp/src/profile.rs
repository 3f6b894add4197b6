//! Device profiles: reusable metric bundles matched by sysObjectID.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use integrations_base::CheckError;

use crate::oid::Oid;

/// A profile as written in `init_config.profiles`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// YAML file holding the definition.
    #[serde(default)]
    pub definition_file: Option<PathBuf>,

    /// Inline definition.
    #[serde(default)]
    pub definition: Option<ProfileDefinition>,
}

/// Metrics of a profile and the devices it applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    /// sysObjectID of matching devices; may end in `.*`.
    #[serde(default)]
    pub sysobjectid: Option<String>,

    #[serde(default)]
    pub metrics: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub definition: ProfileDefinition,
}

pub type Profiles = BTreeMap<String, Profile>;

/// Load every configured profile.
///
/// Relative `definition_file` paths are resolved against `base_dir`.
pub fn load_profiles(
    configs: &BTreeMap<String, ProfileConfig>,
    base_dir: Option<&Path>,
) -> Result<Profiles, CheckError> {
    let mut profiles = Profiles::new();

    for (name, config) in configs {
        let definition = match (&config.definition, &config.definition_file) {
            (Some(definition), _) => definition.clone(),
            (None, Some(file)) => {
                let path = match base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file.clone(),
                };
                read_definition(name, &path)?
            }
            (None, None) => {
                return Err(CheckError::configuration(format!(
                    "Profile '{}' needs a definition or a definition_file",
                    name
                )));
            }
        };

        profiles.insert(
            name.clone(),
            Profile {
                name: name.clone(),
                definition,
            },
        );
    }

    Ok(profiles)
}

fn read_definition(name: &str, path: &Path) -> Result<ProfileDefinition, CheckError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CheckError::configuration(format!(
            "Couldn't read profile '{}' in '{}': {}",
            name,
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        CheckError::configuration(format!(
            "Couldn't read profile '{}' in '{}': {}",
            name,
            path.display(),
            e
        ))
    })
}

/// A sysObjectID, optionally ending in a `.*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidPattern {
    prefix: Oid,
    wildcard: bool,
}

impl OidPattern {
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        let (base, wildcard) = match pattern.strip_suffix(".*") {
            Some(base) => (base, true),
            None => (pattern, false),
        };
        let prefix = base.parse().ok()?;
        Some(Self { prefix, wildcard })
    }

    pub fn matches(&self, oid: &Oid) -> bool {
        if self.wildcard {
            oid.starts_with(&self.prefix) && oid.len() > self.prefix.len()
        } else {
            *oid == self.prefix
        }
    }

    /// Ordering key: exact patterns first, then longer prefixes.
    fn specificity(&self) -> (bool, usize) {
        (!self.wildcard, self.prefix.len())
    }
}

/// Profiles indexed by the sysObjectID they apply to.
#[derive(Debug, Clone, Default)]
pub struct ProfilesByOid {
    entries: Vec<(OidPattern, String)>,
}

impl ProfilesByOid {
    /// Index the profiles that declare a sysobjectid.
    pub fn from_profiles(profiles: &Profiles) -> Result<Self, CheckError> {
        let mut entries: Vec<(OidPattern, String)> = Vec::new();
        let mut seen: BTreeMap<String, String> = BTreeMap::new();

        for (name, profile) in profiles {
            let Some(sysobjectid) = &profile.definition.sysobjectid else {
                continue;
            };

            let pattern = OidPattern::parse(sysobjectid).ok_or_else(|| {
                CheckError::configuration(format!(
                    "Profile {} has an invalid sysObjectID ({})",
                    name, sysobjectid
                ))
            })?;

            if let Some(other) = seen.insert(sysobjectid.trim().to_string(), name.clone()) {
                return Err(CheckError::configuration(format!(
                    "Profile {} has the same sysObjectID ({}) as {}",
                    name, sysobjectid, other
                )));
            }

            entries.push((pattern, name.clone()));
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Name of the most specific profile matching a device's sysObjectID.
    pub fn matching(&self, sys_object_id: &Oid) -> Option<&str> {
        self.entries
            .iter()
            .filter(|(pattern, _)| pattern.matches(sys_object_id))
            .max_by_key(|(pattern, _)| pattern.specificity())
            .map(|(_, name)| name.as_str())
    }
}
