//! Numeric object identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SnmpError;

/// An owned, dotted-decimal OID (e.g. `1.3.6.1.2.1.1.3.0`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(parts: Vec<u32>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this OID is `parent` or lies below it.
    pub fn starts_with(&self, parent: &Oid) -> bool {
        self.0.starts_with(&parent.0)
    }

    /// The components following `parent`, if this OID lies below it.
    pub fn suffix(&self, parent: &Oid) -> Option<&[u32]> {
        self.0.strip_prefix(parent.0.as_slice())
    }

    /// Append components (e.g. a scalar's `.0` instance).
    pub fn child(&self, parts: &[u32]) -> Oid {
        let mut oid = self.0.clone();
        oid.extend_from_slice(parts);
        Oid(oid)
    }

    /// Convert to the protocol crate's OID type.
    pub fn to_snmp2(&self) -> Result<snmp2::Oid<'static>, SnmpError> {
        let parts: Vec<u64> = self.0.iter().map(|p| u64::from(*p)).collect();
        snmp2::Oid::from(&parts)
            .map(|oid| oid.to_owned())
            .map_err(|e| SnmpError::InvalidOid(format!("{}: {:?}", self, e)))
    }

    /// Convert from the protocol crate's OID type.
    pub fn from_snmp2(oid: &snmp2::Oid) -> Result<Oid, SnmpError> {
        oid.to_id_string().parse()
    }
}

impl FromStr for Oid {
    type Err = SnmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(SnmpError::InvalidOid(s.to_string()));
        }

        trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
            .map_err(|_| SnmpError::InvalidOid(s.to_string()))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
