/// Default key expression prefix for all check submissions.
pub const KEY_PREFIX: &str = "integrations";

/// Builder for constructing check key expressions.
///
/// Key expressions follow the pattern:
/// `integrations/<check>/<instance>/<metric>`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
    check: String,
}

/// Replace characters Zenoh reserves in key expressions.
pub fn sanitize_chunk(chunk: &str) -> String {
    chunk
        .chars()
        .map(|c| match c {
            '/' | '*' | '$' | '?' | '#' => '_',
            c => c,
        })
        .collect()
}

impl KeyExprBuilder {
    /// Create a new key expression builder for a check.
    pub fn new(check: impl Into<String>) -> Self {
        Self {
            prefix: KEY_PREFIX.to_string(),
            check: check.into(),
        }
    }

    /// Create a builder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>, check: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            check: check.into(),
        }
    }

    /// Build a key expression for a metric of one check instance.
    ///
    /// # Example
    /// ```
    /// use integrations_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("snmp");
    /// let key = builder.build("10.0.0.1", "snmp.ifInOctets");
    /// assert_eq!(key, "integrations/snmp/10.0.0.1/snmp.ifInOctets");
    /// ```
    pub fn build(&self, instance: &str, metric: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix,
            self.check,
            sanitize_chunk(instance),
            sanitize_chunk(metric)
        )
    }

    /// Build a key expression for a service check of one instance.
    ///
    /// # Example
    /// ```
    /// use integrations_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("snmp");
    /// let key = builder.service_check_key("10.0.0.1", "snmp.can_check");
    /// assert_eq!(key, "integrations/snmp/10.0.0.1/@/service_check/snmp.can_check");
    /// ```
    pub fn service_check_key(&self, instance: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/@/service_check/{}",
            self.prefix,
            self.check,
            sanitize_chunk(instance),
            sanitize_chunk(name)
        )
    }

    /// Build a key expression for check status.
    ///
    /// # Example
    /// ```
    /// use integrations_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("clickhouse");
    /// assert_eq!(builder.status_key(), "integrations/clickhouse/@/status");
    /// ```
    pub fn status_key(&self) -> String {
        format!("{}/{}/@/status", self.prefix, self.check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder() {
        let builder = KeyExprBuilder::new("snmp");

        assert_eq!(
            builder.build("10.0.0.1", "snmp.sysUpTime"),
            "integrations/snmp/10.0.0.1/snmp.sysUpTime"
        );
        assert_eq!(builder.status_key(), "integrations/snmp/@/status");
    }

    #[test]
    fn test_reserved_characters_are_replaced() {
        let builder = KeyExprBuilder::with_prefix("agent", "harbor");
        assert_eq!(
            builder.build("https://harbor.local", "harbor.projects.count"),
            "agent/harbor/https:__harbor.local/harbor.projects.count"
        );
    }
}
