//! In-memory SNMP agents for exercising checks without a network.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{SnmpClient, SnmpConnector, SnmpValue, VarBind};
use crate::config::{AuthData, TransportTarget};
use crate::error::SnmpError;
use crate::oid::Oid;

/// An in-memory SNMP agent.
///
/// Answers from a sorted OID table the way a real agent walks its MIB, and
/// records the operations it served. Used to exercise the check without a
/// network.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgent {
    values: Arc<BTreeMap<Oid, SnmpValue>>,
    requests: Arc<Mutex<Vec<&'static str>>>,
}

impl InMemoryAgent {
    pub fn new(values: impl IntoIterator<Item = (Oid, SnmpValue)>) -> Self {
        Self {
            values: Arc::new(values.into_iter().collect()),
            requests: Arc::default(),
        }
    }

    /// Operations served so far ("GET", "GETNEXT", "GETBULK").
    pub fn requests(&self) -> Vec<&'static str> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, op: &'static str) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(op);
        }
    }

    fn next_after(&self, oid: &Oid) -> VarBind {
        self.values
            .range((std::ops::Bound::Excluded(oid.clone()), std::ops::Bound::Unbounded))
            .next()
            .map(|(oid, value)| (oid.clone(), value.clone()))
            .unwrap_or_else(|| (oid.clone(), SnmpValue::EndOfMibView))
    }
}

#[async_trait]
impl SnmpClient for InMemoryAgent {
    async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        self.record("GET");
        Ok(oids
            .iter()
            .map(|oid| {
                let value = self
                    .values
                    .get(oid)
                    .cloned()
                    .unwrap_or(SnmpValue::NoSuchInstance);
                (oid.clone(), value)
            })
            .collect())
    }

    async fn get_next(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        self.record("GETNEXT");
        Ok(oids.iter().map(|oid| self.next_after(oid)).collect())
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, SnmpError> {
        self.record("GETBULK");
        let mut varbinds = Vec::new();
        for oid in oids {
            let mut current = oid.clone();
            for _ in 0..max_repetitions {
                let (next, value) = self.next_after(&current);
                let end = value == SnmpValue::EndOfMibView;
                varbinds.push((next.clone(), value));
                if end {
                    break;
                }
                current = next;
            }
        }
        Ok(varbinds)
    }
}

/// Connector handing out [`InMemoryAgent`]s by host; unknown hosts time out.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    agents: BTreeMap<String, InMemoryAgent>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, host: impl Into<String>, agent: InMemoryAgent) -> Self {
        self.agents.insert(host.into(), agent);
        self
    }
}

#[async_trait]
impl SnmpConnector for InMemoryConnector {
    async fn connect(
        &self,
        target: &TransportTarget,
        _auth: &AuthData,
    ) -> Result<Box<dyn SnmpClient>, SnmpError> {
        match self.agents.get(&target.host) {
            Some(agent) => Ok(Box::new(agent.clone())),
            None => Err(SnmpError::Timeout {
                request: "GET",
                attempts: target.retries + 1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn agent() -> InMemoryAgent {
        InMemoryAgent::new([
            (oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(4200)),
            (oid("1.3.6.1.2.1.2.2.1.10.1"), SnmpValue::Counter32(10)),
            (oid("1.3.6.1.2.1.2.2.1.10.2"), SnmpValue::Counter32(20)),
        ])
    }

    #[tokio::test]
    async fn test_in_memory_get_and_next() {
        let mut agent = agent();

        let got = agent
            .get(&[oid("1.3.6.1.2.1.1.3.0"), oid("1.3.6.1.2.1.1.3")])
            .await
            .unwrap();
        assert_eq!(got[0].1, SnmpValue::TimeTicks(4200));
        assert!(got[1].1.is_missing());

        let next = agent.get_next(&[oid("1.3.6.1.2.1.2.2.1.10")]).await.unwrap();
        assert_eq!(next[0].0, oid("1.3.6.1.2.1.2.2.1.10.1"));

        let end = agent.get_next(&[oid("1.3.6.1.2.1.2.2.1.10.2")]).await.unwrap();
        assert_eq!(end[0].1, SnmpValue::EndOfMibView);

        assert_eq!(agent.requests(), vec!["GET", "GETNEXT", "GETNEXT"]);
    }

    #[tokio::test]
    async fn test_in_memory_bulk_stops_at_end() {
        let mut agent = agent();
        let bulk = agent.get_bulk(&[oid("1.3.6.1.2.1.2")], 10).await.unwrap();
        assert_eq!(bulk.len(), 3);
        assert_eq!(bulk[2].1, SnmpValue::EndOfMibView);
    }
}
