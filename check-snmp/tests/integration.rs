//! Integration tests for check-snmp.

use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use serde_json::{Value, json};

use check_snmp::config::InitContext;
use check_snmp::profile::{Profile, ProfileDefinition, Profiles};
use check_snmp::testing::{InMemoryAgent, InMemoryConnector};
use check_snmp::{
    CAN_CHECK, CHECK_NAME, MibError, MibFetcher, NoopMibFetcher, Oid, SnmpCheck, SnmpValue,
};
use integrations_base::testing::{assert_metric, assert_service_check};
use integrations_base::{AgentCheck, Aggregator, MetricType, ServiceCheckStatus};

fn oid(s: &str) -> Oid {
    s.parse().unwrap()
}

fn text(s: &str) -> SnmpValue {
    SnmpValue::OctetString(s.as_bytes().to_vec())
}

fn init() -> InitContext {
    InitContext::default()
        .with_fetcher(Arc::new(NoopMibFetcher))
        .with_fetch_directory("/nonexistent/mibs")
}

/// A router with two interfaces.
fn router() -> InMemoryAgent {
    InMemoryAgent::new([
        (oid("1.3.6.1.2.1.1.2.0"), SnmpValue::ObjectIdentifier(oid("1.3.6.1.4.1.9.1.1745"))),
        (oid("1.3.6.1.2.1.1.3.0"), SnmpValue::TimeTicks(123456)),
        (oid("1.3.6.1.2.1.2.1.0"), SnmpValue::Integer(2)),
        (oid("1.3.6.1.2.1.2.2.1.2.1"), text("eth0")),
        (oid("1.3.6.1.2.1.2.2.1.2.2"), text("eth1")),
        (oid("1.3.6.1.2.1.2.2.1.5.1"), text("fast")),
        (oid("1.3.6.1.2.1.2.2.1.5.2"), SnmpValue::Gauge32(1_000_000_000)),
        (oid("1.3.6.1.2.1.2.2.1.10.1"), SnmpValue::Counter32(1000)),
        (oid("1.3.6.1.2.1.2.2.1.10.2"), SnmpValue::Counter32(2000)),
        (oid("1.3.6.1.2.1.2.2.1.16.1"), SnmpValue::Counter32(3000)),
        (oid("1.3.6.1.2.1.2.2.1.16.2"), SnmpValue::Counter32(4000)),
        (oid("1.3.6.1.2.1.31.1.1.1.18.1"), text("uplink")),
        (oid("1.3.6.1.2.1.31.1.1.1.18.2"), text("backup")),
    ])
}

fn build(instance: Value, init: InitContext, connector: InMemoryConnector) -> SnmpCheck {
    SnmpCheck::from_instance(&instance, Arc::new(init), Arc::new(connector)).unwrap()
}

async fn run(check: &mut SnmpCheck) -> Aggregator {
    let mut aggregator = Aggregator::new(CHECK_NAME);
    check.check(&mut aggregator).await.unwrap();
    aggregator
}

#[tokio::test]
async fn test_table_and_scalar_metrics() {
    let mut check = build(
        json!({
            "ip_address": "10.0.0.1",
            "community_string": "public",
            "tags": ["site:lab"],
            "metrics": [
                {
                    "MIB": "IF-MIB",
                    "table": "ifTable",
                    "symbols": ["ifInOctets", "ifOutOctets"],
                    "metric_tags": [
                        {"tag": "interface", "column": "ifDescr"},
                        {"tag": "alias", "column": "ifAlias", "table": "ifXTable"},
                        {"tag": "if_index", "index": 1},
                    ],
                },
                {"MIB": "SNMPv2-MIB", "symbol": "sysUpTime"},
                {"OID": "1.3.6.1.2.1.2.1.0"},
            ],
        }),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.1", router()),
    );

    let aggregator = run(&mut check).await;

    assert_metric(
        &aggregator,
        "snmp.ifInOctets",
        Some(1000.0),
        &["site:lab", "snmp_device:10.0.0.1", "interface:eth0", "alias:uplink", "if_index:1"],
    );
    assert_metric(
        &aggregator,
        "snmp.ifOutOctets",
        Some(4000.0),
        &["interface:eth1", "alias:backup", "if_index:2"],
    );
    assert_eq!(aggregator.metrics("snmp.ifInOctets").len(), 2);
    assert_eq!(aggregator.metrics("snmp.ifInOctets")[0].metric_type, MetricType::Rate);

    assert_metric(&aggregator, "snmp.sysUpTime", Some(123456.0), &["snmp_device:10.0.0.1"]);
    assert_eq!(aggregator.metrics("snmp.sysUpTime")[0].metric_type, MetricType::Gauge);

    // A raw OID without a name is named after its MIB object
    assert_metric(&aggregator, "snmp.ifNumber", Some(2.0), &[]);

    assert_service_check(&aggregator, CAN_CHECK, ServiceCheckStatus::Ok);
    assert_eq!(
        aggregator.service_checks(CAN_CHECK)[0].tags,
        vec!["site:lab", "snmp_device:10.0.0.1"]
    );
    assert!(aggregator.warnings().is_empty(), "{:?}", aggregator.warnings());
}

#[tokio::test]
async fn test_mib_constraints() {
    let instance = |enforce: bool| {
        json!({
            "ip_address": "10.0.0.1",
            "community_string": "public",
            "enforce_mib_constraints": enforce,
            "metrics": [{"MIB": "IF-MIB", "table": "ifTable", "symbols": ["ifSpeed"]}],
        })
    };

    let mut enforced = build(
        instance(true),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.1", router()),
    );
    let aggregator = run(&mut enforced).await;
    // "fast" is an octet string where the MIB declares a Gauge32
    assert_eq!(aggregator.metrics("snmp.ifSpeed").len(), 1);
    assert_eq!(aggregator.warnings().len(), 1);

    let mut relaxed = build(
        instance(false),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.1", router()),
    );
    let aggregator = run(&mut relaxed).await;
    assert_eq!(aggregator.metrics("snmp.ifSpeed").len(), 1);
    assert!(
        aggregator
            .warnings()
            .iter()
            .any(|w| w == "Unsupported metric type OctetString for snmp.ifSpeed")
    );
}

#[tokio::test]
async fn test_bulk_threshold() {
    let agent = router();
    let mut check = build(
        json!({
            "ip_address": "10.0.0.1",
            "community_string": "public",
            "bulk_threshold": 1,
            "metrics": [{"MIB": "IF-MIB", "table": "ifTable", "symbols": ["ifInOctets", "ifOutOctets"]}],
        }),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.1", agent.clone()),
    );

    let aggregator = run(&mut check).await;
    assert_eq!(aggregator.metrics("snmp.ifOutOctets").len(), 2);
    assert!(agent.requests().contains(&"GETBULK"));
    assert!(!agent.requests().contains(&"GETNEXT"));
}

fn router_profiles() -> Profiles {
    let mut profiles = Profiles::new();
    profiles.insert(
        "cisco".to_string(),
        Profile {
            name: "cisco".to_string(),
            definition: ProfileDefinition {
                sysobjectid: Some("1.3.6.1.4.1.9.1.*".to_string()),
                metrics: vec![json!({"MIB": "IF-MIB", "table": "ifTable", "symbols": ["ifInOctets"]})],
            },
        },
    );
    profiles
}

#[tokio::test]
async fn test_profile_detected_from_sysobjectid() {
    let agent = router();
    let mut check = build(
        json!({"ip_address": "10.0.0.1", "community_string": "public"}),
        init().with_profiles(router_profiles()).unwrap(),
        InMemoryConnector::new().with_agent("10.0.0.1", agent.clone()),
    );

    let aggregator = run(&mut check).await;
    assert_metric(
        &aggregator,
        "snmp.ifInOctets",
        Some(2000.0),
        &["snmp_device:10.0.0.1", "snmp_profile:cisco"],
    );
    assert_service_check(&aggregator, CAN_CHECK, ServiceCheckStatus::Ok);

    // The profile is applied once
    let requests = agent.requests().len();
    let aggregator = run(&mut check).await;
    assert_eq!(aggregator.metrics("snmp.ifInOctets").len(), 2);
    assert_eq!(check.config().metrics.len(), 1);
    assert!(agent.requests().len() > requests);
}

#[tokio::test]
async fn test_no_matching_profile_is_critical() {
    let unknown = InMemoryAgent::new([(
        oid("1.3.6.1.2.1.1.2.0"),
        SnmpValue::ObjectIdentifier(oid("1.3.6.1.4.1.2636.1.1")),
    )]);
    let mut check = build(
        json!({"ip_address": "10.0.0.7", "community_string": "public"}),
        init().with_profiles(router_profiles()).unwrap(),
        InMemoryConnector::new().with_agent("10.0.0.7", unknown),
    );

    let aggregator = run(&mut check).await;
    let service_checks = aggregator.service_checks(CAN_CHECK);
    assert_eq!(service_checks[0].status, ServiceCheckStatus::Critical);
    assert!(
        service_checks[0]
            .message
            .as_deref()
            .unwrap()
            .ends_with("No profile matching sysObjectID 1.3.6.1.4.1.2636.1.1")
    );
}

#[tokio::test]
async fn test_network_discovery() {
    let mut check = build(
        json!({
            "network_address": "10.0.0.0/30",
            "community_string": "public",
            "tags": ["site:lab"],
        }),
        init().with_profiles(router_profiles()).unwrap(),
        InMemoryConnector::new().with_agent("10.0.0.1", router()),
    );

    let aggregator = run(&mut check).await;

    let discovered: Vec<String> = check
        .config()
        .discovered_instances
        .keys()
        .map(|ip| ip.to_string())
        .collect();
    assert_eq!(discovered, vec!["10.0.0.1"]);

    assert_metric(
        &aggregator,
        "snmp.ifInOctets",
        Some(1000.0),
        &["site:lab", "snmp_device:10.0.0.1", "snmp_profile:cisco"],
    );
    assert_service_check(&aggregator, CAN_CHECK, ServiceCheckStatus::Ok);
}

#[tokio::test]
async fn test_failing_discovered_device_is_dropped() {
    let mut check = build(
        json!({
            "network_address": "10.0.0.0/30",
            "community_string": "public",
            "discovery_allowed_failures": 2,
            // Resolving an unknown column fails every run
            "metrics": [{"MIB": "IF-MIB", "table": "ifTable", "symbols": ["ifBogus"]}],
        }),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.2", router()),
    );

    let aggregator = run(&mut check).await;
    assert_service_check(&aggregator, CAN_CHECK, ServiceCheckStatus::Critical);
    assert_eq!(check.config().discovered_instances.len(), 1);
    assert_eq!(check.config().failing_instances.values().copied().collect::<Vec<_>>(), vec![1]);

    run(&mut check).await;
    assert!(check.config().discovered_instances.is_empty());
    assert!(check.config().failing_instances.is_empty());
}

/// Fetcher serving a vendor MIB from memory.
#[derive(Debug)]
struct VendorMibFetcher;

impl MibFetcher for VendorMibFetcher {
    fn fetch(&self, mib: &str, target: &Path) -> Result<(), MibError> {
        if mib != "ACME-MIB" {
            return Err(MibError::NotFound(mib.to_string()));
        }
        std::fs::create_dir_all(target)?;
        std::fs::write(
            target.join("ACME-MIB.json"),
            r#"{
                "imports": {"class": "imports", "SNMPv2-SMI": ["enterprises"]},
                "acmeTemperature": {
                    "name": "acmeTemperature", "oid": "1.3.6.1.4.1.4242.1.1",
                    "nodetype": "scalar", "class": "objecttype",
                    "syntax": {"type": "Integer32", "class": "type"}
                },
                "meta": {"module": "ACME-MIB"}
            }"#,
        )?;
        Ok(())
    }
}

#[tokio::test]
async fn test_missing_mib_is_fetched_and_used() {
    let dir = tempfile::tempdir().unwrap();
    let agent = InMemoryAgent::new([(oid("1.3.6.1.4.1.4242.1.1.0"), SnmpValue::Integer(41))]);

    let mut check = build(
        json!({
            "ip_address": "10.0.0.5",
            "community_string": "public",
            "metrics": [{"MIB": "ACME-MIB", "symbol": "acmeTemperature"}],
        }),
        InitContext::default()
            .with_fetcher(Arc::new(VendorMibFetcher))
            .with_fetch_directory(dir.path()),
        InMemoryConnector::new().with_agent("10.0.0.5", agent),
    );

    let aggregator = run(&mut check).await;
    assert_metric(&aggregator, "snmp.acmeTemperature", Some(41.0), &["snmp_device:10.0.0.5"]);
    assert!(dir.path().join("ACME-MIB.json").is_file());
}

/// Fetcher that completes only once another task of the runtime has run.
#[derive(Debug)]
struct GatedMibFetcher {
    started: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl MibFetcher for GatedMibFetcher {
    fn fetch(&self, mib: &str, target: &Path) -> Result<(), MibError> {
        if let Some(started) = self.started.lock().unwrap().take() {
            started.send(()).ok();
        }
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| MibError::Fetch {
                mib: mib.to_string(),
                message: "runtime stalled during fetch".to_string(),
            })?;
        VendorMibFetcher.fetch(mib, target)
    }
}

#[tokio::test]
async fn test_profile_mib_fetch_leaves_runtime_free() {
    let dir = tempfile::tempdir().unwrap();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = mpsc::channel();

    let mut profiles = Profiles::new();
    profiles.insert(
        "acme".to_string(),
        Profile {
            name: "acme".to_string(),
            definition: ProfileDefinition {
                sysobjectid: Some("1.3.6.1.4.1.4242.*".to_string()),
                metrics: vec![json!({"MIB": "ACME-MIB", "symbol": "acmeTemperature"})],
            },
        },
    );
    let agent = InMemoryAgent::new([
        (oid("1.3.6.1.2.1.1.2.0"), SnmpValue::ObjectIdentifier(oid("1.3.6.1.4.1.4242.2"))),
        (oid("1.3.6.1.4.1.4242.1.1.0"), SnmpValue::Integer(41)),
    ]);

    let mut check = build(
        json!({"ip_address": "10.0.0.5", "community_string": "public"}),
        InitContext::default()
            .with_fetcher(Arc::new(GatedMibFetcher {
                started: Mutex::new(Some(started_tx)),
                release: Mutex::new(release_rx),
            }))
            .with_fetch_directory(dir.path())
            .with_profiles(profiles)
            .unwrap(),
        InMemoryConnector::new().with_agent("10.0.0.5", agent),
    );

    // Runs on the test's single-threaded runtime while the fetch waits
    let releaser = tokio::spawn(async move {
        if started_rx.await.is_ok() {
            release_tx.send(()).ok();
        }
    });

    let aggregator = run(&mut check).await;
    releaser.await.unwrap();

    assert_metric(
        &aggregator,
        "snmp.acmeTemperature",
        Some(41.0),
        &["snmp_device:10.0.0.5", "snmp_profile:acme"],
    );
}

#[tokio::test]
async fn test_configuration_warnings_reach_the_aggregator() {
    let mut check = build(
        json!({
            "ip_address": "10.0.0.1",
            "community_string": "public",
            "metrics": [
                {"MIB": "IF-MIB", "table": "ifTable", "symbols": ["ifInOctets", 7]},
            ],
        }),
        init(),
        InMemoryConnector::new().with_agent("10.0.0.1", router()),
    );

    let aggregator = run(&mut check).await;
    assert_eq!(aggregator.warnings().len(), 1);
    assert!(aggregator.warnings()[0].starts_with("Can't generate MIB object for variable : "));
    assert_eq!(aggregator.metrics("snmp.ifInOctets").len(), 2);
}
