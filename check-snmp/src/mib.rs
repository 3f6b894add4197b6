//! MIB (Management Information Base) loading and symbol resolution.
//!
//! Modules are JSON documents in the layout `mibdump --destination-format json`
//! produces: one entry per symbol (`name`, `oid`, `class`, `nodetype`,
//! `syntax`), plus `imports` and `meta`. A handful of standard modules are
//! compiled in; more are read from directories as `<MODULE>.json`.
//!
//! # Example
//!
//! ```ignore
//! let mut view = MibView::new();
//! view.add_directory("/etc/snmp/mibs");
//! view.load_module("IF-MIB")?;
//!
//! let column = view.resolve_symbol("IF-MIB", "ifInOctets")?;
//! assert_eq!(column.oid.to_string(), "1.3.6.1.2.1.2.2.1.10");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::MibError;
use crate::oid::Oid;

/// Modules available without any MIB directory.
const BUILTIN_MODULES: &[(&str, &str)] = &[
    ("SNMPv2-SMI", include_str!("../mibs/SNMPv2-SMI.json")),
    ("SNMPv2-TC", include_str!("../mibs/SNMPv2-TC.json")),
    ("SNMPv2-CONF", include_str!("../mibs/SNMPv2-CONF.json")),
    ("SNMPv2-MIB", include_str!("../mibs/SNMPv2-MIB.json")),
    ("IF-MIB", include_str!("../mibs/IF-MIB.json")),
    ("HOST-RESOURCES-MIB", include_str!("../mibs/HOST-RESOURCES-MIB.json")),
    ("IP-MIB", include_str!("../mibs/IP-MIB.json")),
];

/// Longest chain of textual conventions followed when reducing a syntax.
const MAX_SYNTAX_DEPTH: usize = 8;

/// Kind of node an object is in the OID tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Table,
    Row,
    Column,
    /// Object identities and other registration points.
    Node,
    Notification,
}

impl NodeKind {
    fn from_raw(nodetype: Option<&str>, class: Option<&str>) -> Self {
        match (nodetype, class) {
            (Some("scalar"), _) => NodeKind::Scalar,
            (Some("table"), _) => NodeKind::Table,
            (Some("row"), _) => NodeKind::Row,
            (Some("column"), _) => NodeKind::Column,
            (_, Some("notificationtype")) => NodeKind::Notification,
            _ => NodeKind::Node,
        }
    }
}

/// An object defined by a MIB module.
#[derive(Debug, Clone, PartialEq)]
pub struct MibObject {
    pub module: String,
    pub name: String,
    pub oid: Oid,
    pub kind: NodeKind,
    /// Declared SYNTAX (e.g. "Counter32", "DisplayString").
    pub syntax: Option<String>,
}

/// SMI base type a syntax reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxClass {
    Integer,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Counter64,
    Gauge32,
    TimeTicks,
    Opaque,
}

impl SyntaxClass {
    /// Map an SMI base type name.
    pub fn from_base(name: &str) -> Option<Self> {
        match name {
            "INTEGER" | "Integer32" => Some(SyntaxClass::Integer),
            "OCTET STRING" | "BITS" => Some(SyntaxClass::OctetString),
            "OBJECT IDENTIFIER" => Some(SyntaxClass::ObjectIdentifier),
            "IpAddress" => Some(SyntaxClass::IpAddress),
            "Counter32" => Some(SyntaxClass::Counter32),
            "Counter64" => Some(SyntaxClass::Counter64),
            "Gauge32" | "Unsigned32" => Some(SyntaxClass::Gauge32),
            "TimeTicks" => Some(SyntaxClass::TimeTicks),
            "Opaque" => Some(SyntaxClass::Opaque),
            _ => None,
        }
    }
}

/// A parsed MIB module.
#[derive(Debug, Clone, Default)]
pub struct MibModule {
    pub name: String,
    /// Modules this one imports from.
    pub imports: Vec<String>,
    pub objects: BTreeMap<String, MibObject>,
    /// Textual conventions: name -> underlying syntax.
    pub conventions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawSymbol {
    name: Option<String>,
    oid: Option<String>,
    class: Option<String>,
    nodetype: Option<String>,
    syntax: Option<RawType>,
    #[serde(rename = "type")]
    base: Option<RawType>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    #[serde(rename = "type")]
    name: Option<String>,
}

impl MibModule {
    /// Parse a module from its JSON representation.
    pub fn from_json(name: &str, json: &str) -> Result<Self, MibError> {
        let parse_error = |message: String| MibError::Parse {
            module: name.to_string(),
            message,
        };

        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| parse_error(e.to_string()))?;

        let module_name = doc
            .get("meta")
            .and_then(|meta| meta.get("module"))
            .and_then(|m| m.as_str())
            .unwrap_or(name)
            .to_string();

        let mut module = MibModule {
            name: module_name,
            ..Default::default()
        };

        for (key, value) in &doc {
            match key.as_str() {
                "meta" => {}
                "imports" => {
                    if let Some(imports) = value.as_object() {
                        module.imports = imports
                            .keys()
                            .filter(|k| k.as_str() != "class")
                            .cloned()
                            .collect();
                    }
                }
                _ => {
                    let raw: RawSymbol = serde_json::from_value(value.clone())
                        .map_err(|e| parse_error(format!("symbol '{}': {}", key, e)))?;
                    module.add_symbol(key, raw)?;
                }
            }
        }

        Ok(module)
    }

    fn add_symbol(&mut self, key: &str, raw: RawSymbol) -> Result<(), MibError> {
        if raw.class.as_deref() == Some("textualconvention") {
            if let Some(base) = raw.base.and_then(|b| b.name) {
                self.conventions.insert(key.to_string(), base);
            }
            return Ok(());
        }

        let Some(oid) = raw.oid else {
            // Types and macros carry no OID
            return Ok(());
        };

        let oid: Oid = oid.parse().map_err(|_| MibError::Parse {
            module: self.name.clone(),
            message: format!("symbol '{}' has invalid OID '{}'", key, oid),
        })?;

        let object = MibObject {
            module: self.name.clone(),
            name: raw.name.unwrap_or_else(|| key.to_string()),
            oid,
            kind: NodeKind::from_raw(raw.nodetype.as_deref(), raw.class.as_deref()),
            syntax: raw.syntax.and_then(|s| s.name),
        };

        self.objects.insert(key.to_string(), object);
        Ok(())
    }
}

/// The set of loaded MIB modules an instance resolves symbols against.
#[derive(Debug, Clone, Default)]
pub struct MibView {
    /// Directories searched after the builtin modules.
    directories: Vec<PathBuf>,
    modules: BTreeMap<String, MibModule>,
    /// OID -> (module, symbol) for reverse lookups.
    by_oid: BTreeMap<Oid, (String, String)>,
}

impl MibView {
    /// Create a view that only knows the builtin modules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory of `<MODULE>.json` files to search.
    pub fn add_directory(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.directories.contains(&dir) {
            self.directories.push(dir);
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Whether a module is loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of the loaded modules.
    pub fn loaded_modules(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Load a module and, recursively, the modules it imports.
    pub fn load_module(&mut self, name: &str) -> Result<(), MibError> {
        let mut loading = BTreeSet::new();
        self.load_recursive(name, &mut loading)
    }

    fn load_recursive(&mut self, name: &str, loading: &mut BTreeSet<String>) -> Result<(), MibError> {
        if self.is_loaded(name) || !loading.insert(name.to_string()) {
            return Ok(());
        }

        let source = self.find_source(name)?;
        let module = MibModule::from_json(name, &source)?;

        for import in &module.imports {
            self.load_recursive(import, loading)?;
        }

        tracing::trace!(
            module = %name,
            objects = module.objects.len(),
            "Loaded MIB module"
        );

        for (symbol, object) in &module.objects {
            self.by_oid
                .entry(object.oid.clone())
                .or_insert_with(|| (name.to_string(), symbol.clone()));
        }
        self.modules.insert(name.to_string(), module);

        Ok(())
    }

    fn find_source(&self, name: &str) -> Result<String, MibError> {
        if let Some((_, json)) = BUILTIN_MODULES.iter().find(|(module, _)| *module == name) {
            return Ok((*json).to_string());
        }

        for dir in &self.directories {
            let path = module_path(dir, name);
            if path.is_file() {
                return Ok(std::fs::read_to_string(&path)?);
            }
        }

        Err(MibError::NotFound(name.to_string()))
    }

    /// Resolve `symbol` defined by a loaded `module`.
    pub fn resolve_symbol(&self, module: &str, symbol: &str) -> Result<&MibObject, MibError> {
        let loaded = self.modules.get(module).ok_or_else(|| MibError::NotLoaded {
            module: module.to_string(),
        })?;

        loaded
            .objects
            .get(symbol)
            .ok_or_else(|| MibError::UnknownSymbol {
                module: module.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Find the most specific known object containing `oid`.
    ///
    /// Returns the object and the remaining index components.
    pub fn lookup_oid<'a>(&self, oid: &'a Oid) -> Option<(&MibObject, &'a [u32])> {
        let parts = oid.parts();
        (1..=parts.len()).rev().find_map(|len| {
            let prefix = Oid::new(parts[..len].to_vec());
            let (module, symbol) = self.by_oid.get(&prefix)?;
            let object = self.modules.get(module)?.objects.get(symbol)?;
            Some((object, &parts[len..]))
        })
    }

    /// Reduce an object's syntax to its SMI base type.
    ///
    /// Textual conventions of every loaded module are followed. `None` when
    /// the syntax is unknown.
    pub fn syntax_class(&self, object: &MibObject) -> Option<SyntaxClass> {
        let mut syntax = object.syntax.clone()?;

        for _ in 0..MAX_SYNTAX_DEPTH {
            if let Some(class) = SyntaxClass::from_base(&syntax) {
                return Some(class);
            }

            let next = self
                .modules
                .get(&object.module)
                .and_then(|m| m.conventions.get(&syntax))
                .or_else(|| {
                    self.modules
                        .values()
                        .find_map(|m| m.conventions.get(&syntax))
                })?;
            syntax = next.clone();
        }

        None
    }
}

/// Path of a compiled module inside a MIB directory.
pub fn module_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}
