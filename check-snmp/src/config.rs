//! Configuration of the SNMP check.
//!
//! `init_config` is shared by every instance of the check and becomes an
//! [`InitContext`]. Each entry of `instances` becomes an [`InstanceConfig`]:
//! the metrics to collect, resolved into table walks and raw OID requests,
//! plus the transport and security parameters of the device.
//!
//! ```yaml
//! init_config:
//!   mibs_folder: /etc/snmp/mibs
//!   profiles:
//!     generic-router:
//!       definition_file: generic-router.yaml
//!
//! instances:
//!   - ip_address: 192.168.1.1
//!     community_string: public
//!     metrics:
//!       - MIB: IF-MIB
//!         table: ifTable
//!         symbols: [ifInOctets, ifOutOctets]
//!         metric_tags:
//!           - tag: interface
//!             column: ifDescr
//!       - OID: 1.3.6.1.2.1.1.3.0
//!         name: sysUpTime
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use integrations_base::{CheckError, as_int, is_affirmative};
use integrations_common::values::deserialize_lenient_int;

use crate::client::{SnmpClient, SnmpConnector};
use crate::error::{MibError, SnmpError};
use crate::fetch::{MibFetcher, RemoteMibFetcher, default_fetch_directory};
use crate::mib::MibView;
use crate::network::IpNetwork;
use crate::oid::Oid;
use crate::profile::{Profile, ProfileConfig, Profiles, ProfilesByOid, load_profiles};

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_ALLOWED_FAILURES: u32 = 3;
pub const DEFAULT_BULK_THRESHOLD: usize = 5;
pub const DEFAULT_PORT: u16 = 161;
pub const DEFAULT_SNMP_VERSION: i64 = 2;
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 3600;

/// `init_config` section of the check configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpInitConfig {
    /// Metrics collected by every instance with `use_global_metrics`.
    #[serde(default)]
    pub global_metrics: Vec<Value>,

    /// Directory of compiled (JSON) MIB modules.
    #[serde(default)]
    pub mibs_folder: Option<PathBuf>,

    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Base directory of relative `definition_file` paths.
    #[serde(default)]
    pub profiles_folder: Option<PathBuf>,

    /// URL template MIB sources are downloaded from.
    #[serde(default)]
    pub mib_source: Option<String>,

    /// MIB compiler executable.
    #[serde(default)]
    pub mib_compiler: Option<PathBuf>,
}

/// Settings shared by every instance of the check.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub global_metrics: Vec<Value>,
    pub mibs_folder: Option<PathBuf>,
    pub profiles: Profiles,
    pub profiles_by_oid: ProfilesByOid,
    pub fetcher: Arc<dyn MibFetcher>,
    /// Directory fetched MIBs are compiled into.
    pub fetch_directory: PathBuf,
}

impl Default for InitContext {
    fn default() -> Self {
        Self {
            global_metrics: Vec::new(),
            mibs_folder: None,
            profiles: Profiles::new(),
            profiles_by_oid: ProfilesByOid::default(),
            fetcher: Arc::new(RemoteMibFetcher::new()),
            fetch_directory: default_fetch_directory(),
        }
    }
}

impl InitContext {
    /// Load profiles and set up MIB fetching from `init_config`.
    pub fn from_init_config(init: &SnmpInitConfig) -> Result<Self, CheckError> {
        let profiles = load_profiles(&init.profiles, init.profiles_folder.as_deref())?;
        let profiles_by_oid = ProfilesByOid::from_profiles(&profiles)?;

        let mut fetcher = RemoteMibFetcher::new();
        if let Some(source) = &init.mib_source {
            fetcher = fetcher.with_source(source.clone());
        }
        if let Some(compiler) = &init.mib_compiler {
            fetcher = fetcher.with_compiler(compiler.clone());
        }

        Ok(Self {
            global_metrics: init.global_metrics.clone(),
            mibs_folder: init.mibs_folder.clone(),
            profiles,
            profiles_by_oid,
            fetcher: Arc::new(fetcher),
            fetch_directory: init
                .mibs_folder
                .clone()
                .unwrap_or_else(default_fetch_directory),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn MibFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_fetch_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fetch_directory = dir.into();
        self
    }

    pub fn with_mibs_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mibs_folder = Some(dir.into());
        self
    }

    pub fn with_global_metrics(mut self, metrics: Vec<Value>) -> Self {
        self.global_metrics = metrics;
        self
    }

    /// Replace the profiles and re-index them by sysObjectID.
    pub fn with_profiles(mut self, profiles: Profiles) -> Result<Self, CheckError> {
        self.profiles_by_oid = ProfilesByOid::from_profiles(&profiles)?;
        self.profiles = profiles;
        Ok(self)
    }
}

/// UDP endpoint of an SNMP agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub retries: u32,
}

impl TransportTarget {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityVersion {
    V1,
    V2c,
}

/// USM authentication protocols, by their pysnmp names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    NoAuth,
    HmacMd5,
    HmacSha,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl AuthProtocol {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "usmNoAuthProtocol" => Some(AuthProtocol::NoAuth),
            "usmHMACMD5AuthProtocol" => Some(AuthProtocol::HmacMd5),
            "usmHMACSHAAuthProtocol" => Some(AuthProtocol::HmacSha),
            "usmHMAC128SHA224AuthProtocol" => Some(AuthProtocol::HmacSha224),
            "usmHMAC192SHA256AuthProtocol" => Some(AuthProtocol::HmacSha256),
            "usmHMAC256SHA384AuthProtocol" => Some(AuthProtocol::HmacSha384),
            "usmHMAC384SHA512AuthProtocol" => Some(AuthProtocol::HmacSha512),
            _ => None,
        }
    }
}

/// USM privacy protocols, by their pysnmp names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    NoPriv,
    Des,
    TripleDes,
    Aes128,
    Aes192,
    Aes256,
}

impl PrivProtocol {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "usmNoPrivProtocol" => Some(PrivProtocol::NoPriv),
            "usmDESPrivProtocol" => Some(PrivProtocol::Des),
            "usm3DESEDEPrivProtocol" => Some(PrivProtocol::TripleDes),
            "usmAesCfb128Protocol" => Some(PrivProtocol::Aes128),
            "usmAesCfb192Protocol" => Some(PrivProtocol::Aes192),
            "usmAesCfb256Protocol" => Some(PrivProtocol::Aes256),
            _ => None,
        }
    }
}

/// SNMPv3 user-based security parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmUser {
    pub user: String,
    pub auth_key: Option<String>,
    pub priv_key: Option<String>,
    pub auth_protocol: Option<AuthProtocol>,
    pub priv_protocol: Option<PrivProtocol>,
}

/// Security parameters of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthData {
    Community {
        community: String,
        version: CommunityVersion,
    },
    Usm(UsmUser),
}

impl AuthData {
    /// SNMP message processing model: 0 (v1), 1 (v2c) or 3 (v3).
    pub fn mp_model(&self) -> u8 {
        match self {
            AuthData::Community {
                version: CommunityVersion::V1,
                ..
            } => 0,
            AuthData::Community {
                version: CommunityVersion::V2c,
                ..
            } => 1,
            AuthData::Usm(_) => 3,
        }
    }
}

/// SNMPv3 context of the requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextData {
    pub context_engine_id: Option<Vec<u8>>,
    pub context_name: String,
}

/// A MIB object named by OID or by module and symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectIdentity {
    Oid(Oid),
    Symbol { mib: String, symbol: String },
}

impl ObjectIdentity {
    /// Name a symbol of `mib`; the symbol must be a valid SMI identifier.
    pub fn symbol(mib: &str, symbol: &Value) -> Result<Self, String> {
        let name = symbol
            .as_str()
            .ok_or_else(|| format!("MIB symbol must be a string, not {}", symbol))?;
        if !is_smi_identifier(name) {
            return Err(format!("'{}' is not a valid MIB symbol name", name));
        }
        Ok(ObjectIdentity::Symbol {
            mib: mib.to_string(),
            symbol: name.to_string(),
        })
    }

    /// OID of the object in `view`.
    pub fn resolve(&self, view: &MibView) -> Result<Oid, MibError> {
        match self {
            ObjectIdentity::Oid(oid) => Ok(oid.clone()),
            ObjectIdentity::Symbol { mib, symbol } => {
                view.resolve_symbol(mib, symbol).map(|object| object.oid.clone())
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            ObjectIdentity::Oid(oid) => oid.to_string(),
            ObjectIdentity::Symbol { symbol, .. } => symbol.clone(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectIdentity::Oid(oid) => write!(f, "{}", oid),
            ObjectIdentity::Symbol { mib, symbol } => write!(f, "{}::{}", mib, symbol),
        }
    }
}

fn is_smi_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// A table (or scalar) walk and the columns it collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: ObjectIdentity,
    pub symbols: Vec<ObjectIdentity>,
}

/// Table queries keyed by `(MIB, table or symbol)`.
pub type TableOids = BTreeMap<(String, String), TableQuery>;

/// A `metric_tags` entry of a table metric.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricTag {
    #[serde(default)]
    pub tag: Option<String>,

    /// 1-based position in the row index.
    #[serde(default, deserialize_with = "deserialize_lenient_int")]
    pub index: Option<i64>,

    #[serde(default)]
    pub column: Option<Value>,

    #[serde(default, rename = "MIB")]
    pub mib: Option<String>,

    #[serde(default)]
    pub table: Option<String>,
}

impl MetricTag {
    pub fn column_name(&self) -> Option<&str> {
        self.column.as_ref().and_then(Value::as_str)
    }
}

/// An entry of the `metrics` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricDefinition {
    #[serde(default, rename = "MIB")]
    pub mib: Option<String>,

    #[serde(default)]
    pub table: Option<String>,

    #[serde(default)]
    pub symbol: Option<Value>,

    #[serde(default)]
    pub symbols: Option<Vec<Value>>,

    #[serde(default, rename = "OID")]
    pub oid: Option<Value>,

    /// Metric name of a raw OID.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub metric_tags: Vec<MetricTag>,

    /// `gauge`, `counter` or `monotonic_count`.
    #[serde(default)]
    pub forced_type: Option<String>,
}

impl MetricDefinition {
    pub fn from_value(metric: &Value) -> Result<Self, CheckError> {
        if !metric.is_object() {
            return Err(unsupported_metric(metric));
        }
        serde_json::from_value(metric.clone()).map_err(|e| {
            CheckError::configuration(format!("Invalid metric in config file: {}: {}", metric, e))
        })
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol.as_ref().and_then(Value::as_str)
    }

    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().flatten().filter_map(Value::as_str)
    }

    /// OID of a raw OID metric.
    pub fn raw_oid(&self) -> Option<Oid> {
        self.oid.as_ref().and_then(|oid| value_to_string(oid).parse().ok())
    }
}

fn unsupported_metric(metric: &Value) -> CheckError {
    CheckError::configuration(format!("Unsupported metric in config file: {}", metric))
}

/// Queries derived from a metrics list.
#[derive(Debug, Clone, Default)]
pub struct ParsedMetrics {
    pub table_oids: TableOids,
    pub raw_oids: Vec<Oid>,
    pub mibs_to_load: BTreeSet<String>,
    pub definitions: Vec<MetricDefinition>,
}

impl ParsedMetrics {
    fn table_symbols(&mut self, mib: &str, table: &str) -> &mut Vec<ObjectIdentity> {
        &mut self
            .table_oids
            .entry((mib.to_string(), table.to_string()))
            .or_insert_with(|| TableQuery {
                table: ObjectIdentity::Symbol {
                    mib: mib.to_string(),
                    symbol: table.to_string(),
                },
                symbols: Vec::new(),
            })
            .symbols
    }
}

fn object_warning(warnings: &mut Vec<String>, metric: &Value, error: &str) {
    warnings.push(format!(
        "Can't generate MIB object for variable : {}\nException: {}",
        metric, error
    ));
}

/// Turn a metrics list into table walks, raw OIDs and the MIBs they need.
///
/// Symbols that cannot be named are reported in `warnings` and skipped;
/// structurally invalid metrics are configuration errors.
pub fn parse_metrics(metrics: &[Value], warnings: &mut Vec<String>) -> Result<ParsedMetrics, CheckError> {
    let mut parsed = ParsedMetrics::default();

    for metric in metrics {
        let definition = MetricDefinition::from_value(metric)?;

        if let Some(mib) = &definition.mib {
            if definition.table.is_none() && definition.symbol.is_none() {
                return Err(CheckError::configuration(
                    "When specifying a MIB, you must specify either table or symbol",
                ));
            }
            parsed.mibs_to_load.insert(mib.clone());

            if let Some(symbol) = &definition.symbol {
                match ObjectIdentity::symbol(mib, symbol) {
                    Ok(ObjectIdentity::Symbol { symbol, .. }) => {
                        parsed.table_symbols(mib, &symbol);
                    }
                    Ok(ObjectIdentity::Oid(_)) => {}
                    Err(e) => object_warning(warnings, metric, &e),
                }
            } else {
                let (Some(table), Some(symbols)) = (&definition.table, &definition.symbols) else {
                    return Err(CheckError::configuration(
                        "When specifying a table, you must specify a list of symbols",
                    ));
                };

                for symbol in symbols {
                    match ObjectIdentity::symbol(mib, symbol) {
                        Ok(object) => parsed.table_symbols(mib, table).push(object),
                        Err(e) => object_warning(warnings, metric, &e),
                    }
                }
                // The table is queried even when none of its symbols could be named
                parsed.table_symbols(mib, table);

                for metric_tag in &definition.metric_tags {
                    if metric_tag.tag.is_none()
                        || (metric_tag.index.is_none() && metric_tag.column.is_none())
                    {
                        return Err(CheckError::configuration(
                            "When specifying metric tags, you must specify a tag, and an index or column",
                        ));
                    }

                    let Some(column) = &metric_tag.column else {
                        continue;
                    };

                    // Tag columns are queried alongside the metric's symbols
                    let tag_mib = metric_tag.mib.as_deref().unwrap_or(mib);
                    let object = match ObjectIdentity::symbol(tag_mib, column) {
                        Ok(object) => object,
                        Err(e) => {
                            object_warning(warnings, metric, &e);
                            continue;
                        }
                    };

                    if let Some(tag_table) = &metric_tag.table {
                        parsed.table_symbols(tag_mib, tag_table).push(object);
                    } else if tag_mib != mib {
                        return Err(CheckError::configuration(
                            "When tagging from a different MIB, the table must be specified",
                        ));
                    } else {
                        parsed.table_symbols(mib, table).push(object);
                    }
                }
            }
        } else if let Some(oid) = &definition.oid {
            let oid: Oid = value_to_string(oid).parse()?;
            parsed.raw_oids.push(oid);
        } else {
            return Err(unsupported_metric(metric));
        }

        parsed.definitions.push(definition);
    }

    Ok(parsed)
}

/// Security parameters from `community_string` or `user`.
pub fn get_auth_data(instance: &Map<String, Value>) -> Result<AuthData, CheckError> {
    if let Some(community) = instance.get("community_string") {
        let version = int_setting(instance, "snmp_version", DEFAULT_SNMP_VERSION)?;
        return Ok(AuthData::Community {
            community: value_to_string(community),
            version: if version == 1 {
                CommunityVersion::V1
            } else {
                CommunityVersion::V2c
            },
        });
    }

    let Some(user) = instance.get("user") else {
        return Err(CheckError::configuration(
            "An authentication method needs to be provided",
        ));
    };

    let mut usm = UsmUser {
        user: value_to_string(user),
        auth_key: None,
        priv_key: None,
        auth_protocol: None,
        priv_protocol: None,
    };

    if let Some(key) = instance.get("authKey") {
        usm.auth_key = Some(value_to_string(key));
        usm.auth_protocol = Some(AuthProtocol::HmacMd5);
    }
    if let Some(key) = instance.get("privKey") {
        usm.priv_key = Some(value_to_string(key));
        usm.auth_protocol = Some(AuthProtocol::HmacMd5);
        usm.priv_protocol = Some(PrivProtocol::Des);
    }
    if let Some(name) = instance.get("authProtocol") {
        let name = value_to_string(name);
        usm.auth_protocol = Some(AuthProtocol::from_name(&name).ok_or_else(|| {
            CheckError::configuration(format!("Unsupported authProtocol: {}", name))
        })?);
    }
    if let Some(name) = instance.get("privProtocol") {
        let name = value_to_string(name);
        usm.priv_protocol = Some(PrivProtocol::from_name(&name).ok_or_else(|| {
            CheckError::configuration(format!("Unsupported privProtocol: {}", name))
        })?);
    }

    Ok(AuthData::Usm(usm))
}

/// SNMPv3 context; only read for `user` instances.
pub fn get_context_data(instance: &Map<String, Value>) -> ContextData {
    let mut context = ContextData::default();

    if instance.contains_key("user") {
        if let Some(engine_id) = instance.get("context_engine_id") {
            context.context_engine_id = Some(value_to_string(engine_id).into_bytes());
        }
        if let Some(name) = instance.get("context_name") {
            context.context_name = value_to_string(name);
        }
    }

    context
}

/// Parsed configuration of one check instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// The raw instance mapping.
    instance: Map<String, Value>,
    pub tags: Vec<String>,
    pub metrics: Vec<Value>,
    /// Explicitly configured profile.
    pub profile: Option<String>,
    pub enforce_constraints: bool,
    pub mib_view: MibView,
    pub allowed_failures: u32,
    pub bulk_threshold: usize,
    pub timeout: Duration,
    pub retries: u32,
    /// Agent port, also used for discovered hosts.
    pub port: u16,
    pub discovery_interval: Duration,
    pub ip_address: Option<String>,
    pub ip_network: Option<IpNetwork>,
    pub transport: Option<TransportTarget>,
    pub table_oids: TableOids,
    pub raw_oids: Vec<Oid>,
    pub mibs_to_load: BTreeSet<String>,
    pub definitions: Vec<MetricDefinition>,
    pub auth_data: AuthData,
    pub context_data: ContextData,
    pub discovered_instances: BTreeMap<IpAddr, InstanceConfig>,
    pub failing_instances: BTreeMap<IpAddr, u32>,
    fetcher: Arc<dyn MibFetcher>,
    fetch_directory: PathBuf,
}

impl InstanceConfig {
    /// Build the configuration of one instance.
    ///
    /// Non-fatal problems (symbols that cannot be named) are appended to
    /// `warnings`.
    pub fn new(
        instance: &Value,
        init: &InitContext,
        warnings: &mut Vec<String>,
    ) -> Result<Self, CheckError> {
        let instance = instance
            .as_object()
            .cloned()
            .ok_or_else(|| CheckError::configuration("An instance must be a mapping"))?;

        let mut tags = string_list(&instance, "tags")?;
        let mut metrics = value_list(&instance, "metrics")?;

        if flag(&instance, "use_global_metrics", true) {
            metrics.extend(init.global_metrics.iter().cloned());
        }

        let profile = text_setting(&instance, "profile");
        if let Some(name) = &profile {
            let profile = init.profiles.get(name).ok_or_else(|| {
                CheckError::configuration(format!("Unknown profile '{}'", name))
            })?;
            metrics.extend(profile.definition.metrics.iter().cloned());
        }

        let enforce_constraints = flag(&instance, "enforce_mib_constraints", true);

        let mut mib_view = MibView::new();
        if let Some(folder) = &init.mibs_folder {
            mib_view.add_directory(folder.clone());
        }
        mib_view.add_directory(init.fetch_directory.clone());

        let allowed_failures =
            int_setting(&instance, "discovery_allowed_failures", DEFAULT_ALLOWED_FAILURES)?;
        let bulk_threshold = int_setting(&instance, "bulk_threshold", DEFAULT_BULK_THRESHOLD)?;
        let timeout = Duration::from_secs(int_setting(&instance, "timeout", DEFAULT_TIMEOUT_SECS)?);
        let retries = int_setting(&instance, "retries", DEFAULT_RETRIES)?;
        let port = int_setting(&instance, "port", DEFAULT_PORT)?;
        let discovery_interval = Duration::from_secs(int_setting(
            &instance,
            "discovery_interval",
            DEFAULT_DISCOVERY_INTERVAL_SECS,
        )?);

        let ip_address = text_setting(&instance, "ip_address");
        let network_address = text_setting(&instance, "network_address");

        let (transport, ip_network) = match (&ip_address, &network_address) {
            (None, None) => {
                return Err(CheckError::configuration(
                    "An IP address or a network address needs to be specified",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(CheckError::configuration(
                    "Only one of IP address and network address must be specified",
                ));
            }
            (Some(ip), None) => {
                tags.push(format!("snmp_device:{}", ip));
                let target = TransportTarget {
                    host: ip.clone(),
                    port,
                    timeout,
                    retries,
                };
                (Some(target), None)
            }
            (None, Some(network)) => {
                let network = network.parse::<IpNetwork>().map_err(|e| {
                    CheckError::configuration(format!("Invalid network address: {}", e))
                })?;
                (None, Some(network))
            }
        };

        if metrics.is_empty() && init.profiles_by_oid.is_empty() {
            return Err(CheckError::configuration(
                "Instance should specify at least one metric or profiles should be defined",
            ));
        }

        let mut config = Self {
            auth_data: AuthData::Community {
                community: String::new(),
                version: CommunityVersion::V2c,
            },
            context_data: ContextData::default(),
            tags,
            metrics,
            profile,
            enforce_constraints,
            mib_view,
            allowed_failures,
            bulk_threshold,
            timeout,
            retries,
            port,
            discovery_interval,
            ip_address,
            ip_network,
            transport,
            table_oids: TableOids::new(),
            raw_oids: Vec::new(),
            mibs_to_load: BTreeSet::new(),
            definitions: Vec::new(),
            discovered_instances: BTreeMap::new(),
            failing_instances: BTreeMap::new(),
            fetcher: init.fetcher.clone(),
            fetch_directory: init.fetch_directory.clone(),
            instance,
        };

        config.parse_metrics(warnings)?;
        config.auth_data = get_auth_data(&config.instance)?;
        config.context_data = get_context_data(&config.instance);

        Ok(config)
    }

    /// Configuration of a host found by discovery of a network instance.
    pub fn for_discovered_host(
        network_instance: &Map<String, Value>,
        host: IpAddr,
        init: &InitContext,
        warnings: &mut Vec<String>,
    ) -> Result<Self, CheckError> {
        let mut instance = network_instance.clone();
        instance.remove("network_address");
        instance.insert("ip_address".to_string(), Value::String(host.to_string()));
        Self::new(&Value::Object(instance), init, warnings)
    }

    /// Name of the instance in logs and key expressions.
    pub fn instance_name(&self) -> String {
        text_setting(&self.instance, "name")
            .or_else(|| self.ip_address.clone())
            .or_else(|| self.ip_network.map(|n| n.to_string()))
            .unwrap_or_else(|| "snmp".to_string())
    }

    /// The raw instance mapping.
    pub fn instance(&self) -> &Map<String, Value> {
        &self.instance
    }

    /// Re-derive the queries from `metrics` and load the MIBs they need.
    pub fn parse_metrics(&mut self, warnings: &mut Vec<String>) -> Result<(), CheckError> {
        let parsed = parse_metrics(&self.metrics, warnings)?;
        self.load_mibs(&parsed);

        self.table_oids = parsed.table_oids;
        self.raw_oids = parsed.raw_oids;
        self.mibs_to_load = parsed.mibs_to_load;
        self.definitions = parsed.definitions;
        Ok(())
    }

    /// Add a profile's metrics.
    pub fn refresh_with_profile(
        &mut self,
        profile: &Profile,
        warnings: &mut Vec<String>,
    ) -> Result<(), CheckError> {
        self.metrics
            .extend(profile.definition.metrics.iter().cloned());
        self.parse_metrics(warnings)
    }

    fn load_mibs(&mut self, parsed: &ParsedMetrics) {
        // Modules of foreign tag tables are needed to resolve their columns
        let mut modules: BTreeSet<&str> = parsed.mibs_to_load.iter().map(String::as_str).collect();
        modules.extend(parsed.table_oids.keys().map(|(mib, _)| mib.as_str()));

        for mib in modules {
            match self.mib_view.load_module(mib) {
                Ok(()) => {}
                Err(MibError::NotFound(_)) => {
                    tracing::debug!("Couldn't found mib {}, trying to fetch it", mib);
                    if let Err(e) = self.fetch_mib(mib) {
                        tracing::warn!(mib = %mib, error = %e, "Failed to fetch MIB");
                    }
                }
                Err(e) => {
                    tracing::warn!(mib = %mib, error = %e, "Failed to load MIB");
                }
            }
        }
    }

    /// Fetch and compile a missing MIB, then load it.
    pub fn fetch_mib(&mut self, mib: &str) -> Result<(), MibError> {
        self.fetcher.fetch(mib, &self.fetch_directory)?;
        self.mib_view.load_module(mib)
    }

    /// Open an SNMP session to the device.
    pub async fn session(
        &self,
        connector: &dyn SnmpConnector,
    ) -> Result<Box<dyn SnmpClient>, SnmpError> {
        let target = self.transport.as_ref().ok_or_else(|| SnmpError::Session {
            target: self.instance_name(),
            message: "network instances have no transport target".to_string(),
        })?;
        connector.connect(target, &self.auth_data).await
    }
}

fn setting<'a>(instance: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    instance.get(key).filter(|v| !v.is_null())
}

fn flag(instance: &Map<String, Value>, key: &str, default: bool) -> bool {
    setting(instance, key).map_or(default, is_affirmative)
}

fn int_setting<T: TryFrom<i64>>(
    instance: &Map<String, Value>,
    key: &str,
    default: T,
) -> Result<T, CheckError> {
    match setting(instance, key) {
        None => Ok(default),
        Some(value) => as_int(value)
            .and_then(|n| T::try_from(n).ok())
            .ok_or_else(|| CheckError::configuration(format!("Invalid value for {}: {}", key, value))),
    }
}

/// A non-empty string setting; numbers are accepted as text.
fn text_setting(instance: &Map<String, Value>, key: &str) -> Option<String> {
    match setting(instance, key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_list(instance: &Map<String, Value>, key: &str) -> Result<Vec<Value>, CheckError> {
    match setting(instance, key) {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values.clone()),
        Some(other) => Err(CheckError::configuration(format!(
            "{} must be a list, got {}",
            key, other
        ))),
    }
}

fn string_list(instance: &Map<String, Value>, key: &str) -> Result<Vec<String>, CheckError> {
    Ok(value_list(instance, key)?.iter().map(value_to_string).collect())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
