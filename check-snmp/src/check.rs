//! The SNMP check: walks tables, fetches raw OIDs and reports metrics.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinSet;

use integrations_base::{AgentCheck, Aggregator, CheckError, ServiceCheckStatus};

use crate::client::{SnmpClient, SnmpConnector, SnmpValue};
use crate::config::{
    AuthData, InitContext, InstanceConfig, MetricDefinition, ObjectIdentity, TransportTarget,
};
use crate::error::SnmpError;
use crate::oid::Oid;
use crate::profile::Profile;

pub const CHECK_NAME: &str = "snmp";

/// Service check reported for every device.
pub const CAN_CHECK: &str = "snmp.can_check";

/// `SNMPv2-MIB::sysObjectID.0`.
const SYS_OBJECT_ID: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 2, 0];

const BULK_MAX_REPETITIONS: u32 = 10;

/// Discovery probes in flight at once.
const DISCOVERY_CONCURRENCY: usize = 64;

/// Values collected from one device in one run.
#[derive(Debug, Default)]
struct Results {
    /// Walked table and scalar values.
    walked: BTreeMap<Oid, SnmpValue>,
    /// Raw OID values, keyed by the requested OID.
    raw: BTreeMap<Oid, SnmpValue>,
}

impl Results {
    /// Walked values under `root`, in OID order.
    fn under<'a>(&'a self, root: &'a Oid) -> impl Iterator<Item = (&'a Oid, &'a SnmpValue)> + 'a {
        self.walked
            .range(root.clone()..)
            .take_while(move |(oid, _)| oid.starts_with(root))
    }
}

/// Check polling one SNMP device, or every device discovered in a network.
pub struct SnmpCheck {
    config: InstanceConfig,
    init: Arc<InitContext>,
    connector: Arc<dyn SnmpConnector>,
    /// Problems found while building the configuration.
    pending_warnings: Vec<String>,
    /// Whether the profile still has to be picked from sysObjectID.
    detect_profile: bool,
    last_discovery: Option<Instant>,
}

impl SnmpCheck {
    pub fn new(
        config: InstanceConfig,
        init: Arc<InitContext>,
        connector: Arc<dyn SnmpConnector>,
        warnings: Vec<String>,
    ) -> Self {
        let detect_profile = config.profile.is_none() && !init.profiles_by_oid.is_empty();
        Self {
            config,
            init,
            connector,
            pending_warnings: warnings,
            detect_profile,
            last_discovery: None,
        }
    }

    /// Build the check of one instance mapping.
    pub fn from_instance(
        instance: &serde_json::Value,
        init: Arc<InitContext>,
        connector: Arc<dyn SnmpConnector>,
    ) -> Result<Self, CheckError> {
        let mut warnings = Vec::new();
        let config = InstanceConfig::new(instance, &init, &mut warnings)?;
        Ok(Self::new(config, init, connector, warnings))
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    fn discovery_due(&self) -> bool {
        self.last_discovery
            .is_none_or(|last| last.elapsed() >= self.config.discovery_interval)
    }

    /// Probe every host of the network for new devices.
    async fn discover(&mut self, aggregator: &mut Aggregator) {
        let Some(network) = self.config.ip_network else {
            return;
        };

        tracing::info!(network = %network, "Starting SNMP discovery");

        let mut probes = JoinSet::new();
        let mut found = Vec::new();

        for host in network.hosts() {
            if self.config.discovered_instances.contains_key(&host) {
                continue;
            }

            let target = TransportTarget {
                host: host.to_string(),
                port: self.config.port,
                timeout: self.config.timeout,
                retries: self.config.retries,
            };
            probes.spawn(probe(
                self.connector.clone(),
                target,
                self.config.auth_data.clone(),
                host,
            ));

            while probes.len() >= DISCOVERY_CONCURRENCY {
                if let Some(Ok(result)) = probes.join_next().await {
                    found.extend(responder(result));
                }
            }
        }

        while let Some(joined) = probes.join_next().await {
            if let Ok(result) = joined {
                found.extend(responder(result));
            }
        }

        for (host, sys_object_id) in found {
            self.add_discovered(host, sys_object_id, aggregator).await;
        }

        tracing::info!(
            network = %network,
            devices = self.config.discovered_instances.len(),
            "SNMP discovery finished"
        );
    }

    async fn add_discovered(&mut self, host: IpAddr, sys_object_id: Oid, aggregator: &mut Aggregator) {
        let instance = self.config.instance().clone();
        let init = self.init.clone();
        let oid = sys_object_id.clone();

        // Building the configuration may fetch and compile MIBs.
        let outcome = tokio::task::spawn_blocking(move || {
            configure_discovered(&instance, host, &init, &oid)
        })
        .await
        .unwrap_or_else(|e| {
            Discovered::Failed(format!("Failed to configure discovered device {}: {}", host, e))
        });

        match outcome {
            Discovered::Device(host_config, warnings) => {
                for warning in warnings {
                    aggregator.warning(warning);
                }
                tracing::info!(device = %host, sys_object_id = %sys_object_id, "Discovered SNMP device");
                self.config.discovered_instances.insert(host, *host_config);
            }
            Discovered::Unmatched => {
                tracing::warn!(
                    device = %host,
                    sys_object_id = %sys_object_id,
                    "Discovered device didn't match a profile"
                );
            }
            Discovered::Failed(message) => aggregator.warning(message),
        }
    }

    /// Check every discovered device, dropping those failing too often.
    async fn check_discovered(&mut self, aggregator: &mut Aggregator) {
        let hosts: Vec<IpAddr> = self.config.discovered_instances.keys().copied().collect();

        for host in hosts {
            let Some(mut device) = self.config.discovered_instances.remove(&host) else {
                continue;
            };

            let ok = check_device(
                &mut device,
                &self.init,
                self.connector.as_ref(),
                &mut false,
                aggregator,
            )
            .await;

            if ok {
                self.config.failing_instances.remove(&host);
            } else {
                let failures = self.config.failing_instances.entry(host).or_insert(0);
                *failures += 1;
                if *failures >= self.config.allowed_failures {
                    tracing::warn!(
                        device = %host,
                        failures = *failures,
                        "Removing discovered device after repeated failures"
                    );
                    self.config.failing_instances.remove(&host);
                    continue;
                }
            }

            self.config.discovered_instances.insert(host, device);
        }
    }
}

#[async_trait]
impl AgentCheck for SnmpCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn instance_name(&self) -> String {
        self.config.instance_name()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> Result<(), CheckError> {
        for warning in self.pending_warnings.drain(..) {
            aggregator.warning(warning);
        }

        if self.config.ip_network.is_some() {
            if self.discovery_due() {
                self.discover(aggregator).await;
                self.last_discovery = Some(Instant::now());
            }
            self.check_discovered(aggregator).await;
            return Ok(());
        }

        check_device(
            &mut self.config,
            &self.init,
            self.connector.as_ref(),
            &mut self.detect_profile,
            aggregator,
        )
        .await;
        Ok(())
    }
}

/// Outcome of configuring a host found by discovery.
enum Discovered {
    Device(Box<InstanceConfig>, Vec<String>),
    Unmatched,
    Failed(String),
}

fn configure_discovered(
    network_instance: &Map<String, Value>,
    host: IpAddr,
    init: &InitContext,
    sys_object_id: &Oid,
) -> Discovered {
    let mut warnings = Vec::new();
    let mut config =
        match InstanceConfig::for_discovered_host(network_instance, host, init, &mut warnings) {
            Ok(config) => config,
            Err(e) => {
                return Discovered::Failed(format!(
                    "Failed to configure discovered device {}: {}",
                    host, e
                ));
            }
        };

    match init.profiles_by_oid.matching(sys_object_id) {
        Some(name) => {
            if let Some(profile) = init.profiles.get(name) {
                if let Err(e) = config.refresh_with_profile(profile, &mut warnings) {
                    return Discovered::Failed(format!(
                        "Failed to apply profile {} to {}: {}",
                        name, host, e
                    ));
                }
                config.tags.push(format!("snmp_profile:{}", name));
            }
        }
        None if config.table_oids.is_empty() && config.raw_oids.is_empty() => {
            return Discovered::Unmatched;
        }
        None => {}
    }

    Discovered::Device(Box::new(config), warnings)
}

/// Add a profile's metrics on the blocking pool, as its MIBs may be fetched.
async fn apply_profile(
    config: &mut InstanceConfig,
    profile: &Profile,
) -> Result<Vec<String>, CheckError> {
    let mut refreshed = config.clone();
    let profile = profile.clone();

    let (refreshed, warnings) = tokio::task::spawn_blocking(move || {
        let mut warnings = Vec::new();
        refreshed.refresh_with_profile(&profile, &mut warnings)?;
        Ok::<_, CheckError>((refreshed, warnings))
    })
    .await
    .map_err(|e| CheckError::collection(format!("Profile refresh failed: {}", e)))??;

    *config = refreshed;
    Ok(warnings)
}

type ProbeResult = (IpAddr, Result<Oid, SnmpError>);

async fn probe(
    connector: Arc<dyn SnmpConnector>,
    target: TransportTarget,
    auth: AuthData,
    host: IpAddr,
) -> ProbeResult {
    let result = match connector.connect(&target, &auth).await {
        Ok(mut client) => fetch_sys_object_id(client.as_mut()).await,
        Err(e) => Err(e),
    };
    (host, result)
}

fn responder((host, result): ProbeResult) -> Option<(IpAddr, Oid)> {
    match result {
        Ok(sys_object_id) => Some((host, sys_object_id)),
        Err(e) => {
            tracing::debug!(device = %host, error = %e, "No SNMP agent answered");
            None
        }
    }
}

async fn fetch_sys_object_id(client: &mut dyn SnmpClient) -> Result<Oid, SnmpError> {
    let request = Oid::new(SYS_OBJECT_ID.to_vec());
    match client.get(&[request]).await?.into_iter().next() {
        Some((_, SnmpValue::ObjectIdentifier(oid))) => Ok(oid),
        Some((_, other)) => Err(SnmpError::Request {
            request: "GET",
            message: format!("sysObjectID.0 returned {}", other.type_name()),
        }),
        None => Err(SnmpError::Request {
            request: "GET",
            message: "empty response for sysObjectID.0".to_string(),
        }),
    }
}

/// Collect one device and report `snmp.can_check`; `true` on success.
async fn check_device(
    config: &mut InstanceConfig,
    init: &InitContext,
    connector: &dyn SnmpConnector,
    detect_profile: &mut bool,
    aggregator: &mut Aggregator,
) -> bool {
    match collect(config, init, connector, detect_profile, aggregator).await {
        Ok(()) => {
            aggregator.service_check(CAN_CHECK, ServiceCheckStatus::Ok, &config.tags, None);
            true
        }
        Err(e) => {
            let message = format!(
                "Failed to collect metrics for {} - {}",
                config.instance_name(),
                e
            );
            aggregator.warning(message.clone());
            aggregator.service_check(
                CAN_CHECK,
                ServiceCheckStatus::Critical,
                &config.tags,
                Some(message),
            );
            false
        }
    }
}

async fn collect(
    config: &mut InstanceConfig,
    init: &InitContext,
    connector: &dyn SnmpConnector,
    detect_profile: &mut bool,
    aggregator: &mut Aggregator,
) -> Result<(), CheckError> {
    let mut client = config.session(connector).await?;

    if *detect_profile {
        let sys_object_id = fetch_sys_object_id(client.as_mut()).await?;
        match init.profiles_by_oid.matching(&sys_object_id) {
            Some(name) => {
                if let Some(profile) = init.profiles.get(name) {
                    for warning in apply_profile(config, profile).await? {
                        aggregator.warning(warning);
                    }
                    config.tags.push(format!("snmp_profile:{}", name));
                    tracing::info!(
                        device = %config.instance_name(),
                        profile = %name,
                        "Matched SNMP profile"
                    );
                }
            }
            None if config.table_oids.is_empty() && config.raw_oids.is_empty() => {
                return Err(CheckError::collection(format!(
                    "No profile matching sysObjectID {}",
                    sys_object_id
                )));
            }
            None => {}
        }
        *detect_profile = false;
    }

    let mut results = Results::default();
    fetch_tables(config, client.as_mut(), &mut results).await?;
    fetch_raw(config, client.as_mut(), &mut results).await?;

    report(config, &results, aggregator);
    Ok(())
}

async fn fetch_tables(
    config: &InstanceConfig,
    client: &mut dyn SnmpClient,
    results: &mut Results,
) -> Result<(), CheckError> {
    for query in config.table_oids.values() {
        let roots: BTreeSet<Oid> = if query.symbols.is_empty() {
            BTreeSet::from([query.table.resolve(&config.mib_view)?])
        } else {
            query
                .symbols
                .iter()
                .map(|symbol| symbol.resolve(&config.mib_view))
                .collect::<Result<_, _>>()?
        };

        let bulk = query.symbols.len() > config.bulk_threshold;
        for root in &roots {
            walk(client, root, bulk, &mut results.walked).await?;
        }
    }
    Ok(())
}

/// Collect every value under `root`.
///
/// Stops when the agent leaves the subtree, reports the end of its MIB view,
/// or stops making progress.
async fn walk(
    client: &mut dyn SnmpClient,
    root: &Oid,
    bulk: bool,
    values: &mut BTreeMap<Oid, SnmpValue>,
) -> Result<(), SnmpError> {
    let mut current = root.clone();

    loop {
        let request = [current.clone()];
        let varbinds = if bulk {
            client.get_bulk(&request, BULK_MAX_REPETITIONS).await?
        } else {
            client.get_next(&request).await?
        };

        let mut advanced = false;
        for (oid, value) in varbinds {
            if !oid.starts_with(root) || value == SnmpValue::EndOfMibView || oid <= current {
                return Ok(());
            }
            current = oid.clone();
            values.insert(oid, value);
            advanced = true;
        }

        if !advanced {
            return Ok(());
        }
    }
}

/// GET the raw OIDs, falling back to GETNEXT for missing instances.
async fn fetch_raw(
    config: &InstanceConfig,
    client: &mut dyn SnmpClient,
    results: &mut Results,
) -> Result<(), CheckError> {
    if config.raw_oids.is_empty() {
        return Ok(());
    }

    let mut missing = Vec::new();
    for (requested, (_, value)) in config.raw_oids.iter().zip(client.get(&config.raw_oids).await?) {
        if value.is_missing() {
            missing.push(requested.clone());
        } else {
            results.raw.insert(requested.clone(), value);
        }
    }

    if missing.is_empty() {
        return Ok(());
    }

    for (requested, (oid, value)) in missing.iter().zip(client.get_next(&missing).await?) {
        // Only a value inside the requested subtree stands for it
        if oid.starts_with(requested) && !value.is_empty() {
            results.raw.insert(requested.clone(), value);
        } else {
            tracing::debug!(oid = %requested, "No value for raw OID");
        }
    }
    Ok(())
}

fn report(config: &InstanceConfig, results: &Results, aggregator: &mut Aggregator) {
    for definition in &config.definitions {
        if let Some(mib) = &definition.mib {
            if let Some(symbol) = definition.symbol_name() {
                report_scalar(config, definition, mib, symbol, results, aggregator);
            } else {
                for symbol in definition.symbol_names() {
                    report_column(config, definition, mib, symbol, results, aggregator);
                }
            }
        } else if let Some(oid) = definition.raw_oid() {
            let Some(value) = results.raw.get(&oid) else {
                continue;
            };
            let name = match &definition.name {
                Some(name) => name.clone(),
                None => config
                    .mib_view
                    .lookup_oid(&oid)
                    .map(|(object, _)| object.name.clone())
                    .unwrap_or_else(|| oid.to_string()),
            };
            submit_metric(aggregator, &name, value, definition.forced_type.as_deref(), &config.tags);
        }
    }
}

fn report_scalar(
    config: &InstanceConfig,
    definition: &MetricDefinition,
    mib: &str,
    symbol: &str,
    results: &Results,
    aggregator: &mut Aggregator,
) {
    let Ok(object) = config.mib_view.resolve_symbol(mib, symbol) else {
        return;
    };
    let Some((_, value)) = results.under(&object.oid).next() else {
        tracing::debug!(symbol = %symbol, "No value for scalar");
        return;
    };
    if !satisfies_constraints(config, mib, symbol, value, aggregator) {
        return;
    }
    submit_metric(aggregator, symbol, value, definition.forced_type.as_deref(), &config.tags);
}

fn report_column(
    config: &InstanceConfig,
    definition: &MetricDefinition,
    mib: &str,
    symbol: &str,
    results: &Results,
    aggregator: &mut Aggregator,
) {
    let Ok(object) = config.mib_view.resolve_symbol(mib, symbol) else {
        return;
    };

    for (oid, value) in results.under(&object.oid) {
        let Some(index) = oid.suffix(&object.oid) else {
            continue;
        };
        if !satisfies_constraints(config, mib, symbol, value, aggregator) {
            continue;
        }

        let mut tags = config.tags.clone();
        tags.extend(row_tags(config, definition, mib, index, results, aggregator));
        submit_metric(aggregator, symbol, value, definition.forced_type.as_deref(), &tags);
    }
}

/// Tags of a table row from `metric_tags`.
fn row_tags(
    config: &InstanceConfig,
    definition: &MetricDefinition,
    mib: &str,
    index: &[u32],
    results: &Results,
    aggregator: &mut Aggregator,
) -> Vec<String> {
    let mut tags = Vec::new();

    for metric_tag in &definition.metric_tags {
        let Some(tag) = &metric_tag.tag else {
            continue;
        };

        if let Some(position) = metric_tag.index {
            let component = usize::try_from(position)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| index.get(p));
            match component {
                Some(component) => tags.push(format!("{}:{}", tag, component)),
                None => aggregator.warning(format!(
                    "Not enough indexes, skipping tag {} (index {})",
                    tag, position
                )),
            }
        }

        if let Some(column) = metric_tag.column_name() {
            let column_mib = metric_tag.mib.as_deref().unwrap_or(mib);
            let value = ObjectIdentity::Symbol {
                mib: column_mib.to_string(),
                symbol: column.to_string(),
            }
            .resolve(&config.mib_view)
            .ok()
            .and_then(|oid| results.walked.get(&oid.child(index)))
            .and_then(SnmpValue::as_text);

            match value {
                Some(value) => tags.push(format!("{}:{}", tag, value)),
                None => aggregator.warning(format!(
                    "Failed to get column {} for tag {}, skipping",
                    column, tag
                )),
            }
        }
    }

    tags
}

/// Whether a value's type agrees with the MIB syntax of its object.
fn satisfies_constraints(
    config: &InstanceConfig,
    mib: &str,
    symbol: &str,
    value: &SnmpValue,
    aggregator: &mut Aggregator,
) -> bool {
    if !config.enforce_constraints {
        return true;
    }
    let Ok(object) = config.mib_view.resolve_symbol(mib, symbol) else {
        return true;
    };

    match (config.mib_view.syntax_class(object), value.syntax_class()) {
        (Some(expected), Some(actual)) if expected != actual => {
            aggregator.warning(format!(
                "Value of {} has type {}, which violates its MIB syntax ({:?})",
                symbol,
                value.type_name(),
                expected
            ));
            false
        }
        _ => true,
    }
}

fn numeric_value(value: &SnmpValue) -> Option<f64> {
    match value {
        SnmpValue::Integer(n) => Some(*n as f64),
        SnmpValue::Counter32(n) | SnmpValue::Gauge32(n) | SnmpValue::TimeTicks(n) => {
            Some(f64::from(*n))
        }
        SnmpValue::Counter64(n) => Some(*n as f64),
        SnmpValue::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

/// Submit `snmp.<name>` with the type the SNMP value implies.
fn submit_metric(
    aggregator: &mut Aggregator,
    name: &str,
    value: &SnmpValue,
    forced_type: Option<&str>,
    tags: &[String],
) {
    let metric_name = format!("snmp.{}", name);

    let Some(number) = numeric_value(value) else {
        aggregator.warning(format!(
            "Unsupported metric type {} for {}",
            value.type_name(),
            metric_name
        ));
        return;
    };

    if let Some(forced_type) = forced_type {
        match forced_type {
            "gauge" => aggregator.gauge(metric_name, number, tags),
            "counter" => aggregator.rate(metric_name, number, tags),
            "monotonic_count" => aggregator.monotonic_count(metric_name, number, tags),
            other => aggregator.warning(format!(
                "Invalid forced-type specified: {} in {}",
                other, name
            )),
        }
        return;
    }

    match value {
        SnmpValue::Counter32(_) | SnmpValue::Counter64(_) => {
            aggregator.rate(metric_name, number, tags)
        }
        _ => aggregator.gauge(metric_name, number, tags),
    }
}
