//! SNMP client abstraction over `snmp2`.

use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Value};
use tokio::time::timeout;

use crate::config::{AuthData, AuthProtocol, CommunityVersion, PrivProtocol, TransportTarget, UsmUser};
use crate::error::SnmpError;
use crate::mib::SyntaxClass;
use crate::oid::Oid;

/// An owned SNMP value.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    /// Gauge32 and Unsigned32 share a wire type.
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Opaque(Vec<u8>),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// A type the check does not handle.
    Unsupported,
}

impl SnmpValue {
    fn from_snmp2(value: &Value) -> Self {
        match value {
            Value::Integer(n) => SnmpValue::Integer(*n),
            Value::OctetString(s) => SnmpValue::OctetString(s.to_vec()),
            Value::ObjectIdentifier(oid) => match Oid::from_snmp2(oid) {
                Ok(oid) => SnmpValue::ObjectIdentifier(oid),
                Err(_) => SnmpValue::Unsupported,
            },
            Value::IpAddress(ip) => SnmpValue::IpAddress(*ip),
            Value::Counter32(n) => SnmpValue::Counter32(*n),
            Value::Unsigned32(n) => SnmpValue::Gauge32(*n),
            Value::Timeticks(n) => SnmpValue::TimeTicks(*n),
            Value::Counter64(n) => SnmpValue::Counter64(*n),
            Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
            Value::Null => SnmpValue::Null,
            Value::NoSuchObject => SnmpValue::NoSuchObject,
            Value::NoSuchInstance => SnmpValue::NoSuchInstance,
            Value::EndOfMibView => SnmpValue::EndOfMibView,
            _ => SnmpValue::Unsupported,
        }
    }

    /// `noSuchObject` / `noSuchInstance` exceptions.
    pub fn is_missing(&self) -> bool {
        matches!(self, SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance)
    }

    /// Any exception or null value.
    pub fn is_empty(&self) -> bool {
        self.is_missing() || matches!(self, SnmpValue::EndOfMibView | SnmpValue::Null)
    }

    /// SMI base type of the value.
    pub fn syntax_class(&self) -> Option<SyntaxClass> {
        match self {
            SnmpValue::Integer(_) => Some(SyntaxClass::Integer),
            SnmpValue::OctetString(_) => Some(SyntaxClass::OctetString),
            SnmpValue::ObjectIdentifier(_) => Some(SyntaxClass::ObjectIdentifier),
            SnmpValue::IpAddress(_) => Some(SyntaxClass::IpAddress),
            SnmpValue::Counter32(_) => Some(SyntaxClass::Counter32),
            SnmpValue::Gauge32(_) => Some(SyntaxClass::Gauge32),
            SnmpValue::TimeTicks(_) => Some(SyntaxClass::TimeTicks),
            SnmpValue::Counter64(_) => Some(SyntaxClass::Counter64),
            SnmpValue::Opaque(_) => Some(SyntaxClass::Opaque),
            _ => None,
        }
    }

    /// Name of the SNMP type, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnmpValue::Integer(_) => "Integer",
            SnmpValue::OctetString(_) => "OctetString",
            SnmpValue::ObjectIdentifier(_) => "ObjectIdentifier",
            SnmpValue::IpAddress(_) => "IpAddress",
            SnmpValue::Counter32(_) => "Counter32",
            SnmpValue::Gauge32(_) => "Gauge32",
            SnmpValue::TimeTicks(_) => "TimeTicks",
            SnmpValue::Counter64(_) => "Counter64",
            SnmpValue::Opaque(_) => "Opaque",
            SnmpValue::Null => "Null",
            SnmpValue::NoSuchObject => "NoSuchObject",
            SnmpValue::NoSuchInstance => "NoSuchInstance",
            SnmpValue::EndOfMibView => "EndOfMibView",
            SnmpValue::Unsupported => "Unsupported",
        }
    }

    /// Text rendering used for tag values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::Integer(n) => Some(n.to_string()),
            SnmpValue::OctetString(s) => Some(String::from_utf8_lossy(s).into_owned()),
            SnmpValue::ObjectIdentifier(oid) => Some(oid.to_string()),
            SnmpValue::IpAddress(ip) => Some(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
            SnmpValue::Counter32(n) | SnmpValue::Gauge32(n) | SnmpValue::TimeTicks(n) => {
                Some(n.to_string())
            }
            SnmpValue::Counter64(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A response variable binding.
pub type VarBind = (Oid, SnmpValue);

/// The SNMP operations the check needs.
#[async_trait]
pub trait SnmpClient: Send {
    /// GET each OID.
    async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError>;

    /// GETNEXT from each OID.
    async fn get_next(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError>;

    /// GETBULK from each OID, without non-repeaters.
    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, SnmpError>;
}

/// Opens client sessions to devices.
#[async_trait]
pub trait SnmpConnector: Send + Sync {
    async fn connect(
        &self,
        target: &TransportTarget,
        auth: &AuthData,
    ) -> Result<Box<dyn SnmpClient>, SnmpError>;
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Get,
    GetNext,
    GetBulk(u32),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::GetNext => "GETNEXT",
            Operation::GetBulk(_) => "GETBULK",
        }
    }
}

/// Client backed by an `snmp2` session.
pub struct Snmp2Client {
    session: AsyncSession,
    timeout: Duration,
    retries: u32,
}

impl Snmp2Client {
    /// Open a v1, v2c or v3 session to the target.
    pub async fn connect(target: &TransportTarget, auth: &AuthData) -> Result<Self, SnmpError> {
        let address = target.address();
        let session_error = |e: &dyn std::fmt::Display| SnmpError::Session {
            target: address.clone(),
            message: e.to_string(),
        };

        let session = match auth {
            AuthData::Community { community, version } => match version {
                CommunityVersion::V1 => {
                    AsyncSession::new_v1(&address, community.as_bytes(), 0)
                        .await
                        .map_err(|e| session_error(&e))?
                }
                CommunityVersion::V2c => {
                    AsyncSession::new_v2c(&address, community.as_bytes(), 0)
                        .await
                        .map_err(|e| session_error(&e))?
                }
            },
            AuthData::Usm(user) => {
                let security = usm_security(user).map_err(|e| session_error(&e))?;
                let mut session = AsyncSession::new_v3(&address, 0, security)
                    .await
                    .map_err(|e| session_error(&e))?;
                timeout(target.timeout, session.init())
                    .await
                    .map_err(|_| session_error(&"engine discovery timed out"))?
                    .map_err(|e| session_error(&e))?;
                session
            }
        };

        Ok(Self {
            session,
            timeout: target.timeout,
            retries: target.retries,
        })
    }

    async fn request(&mut self, op: Operation, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        let targets = oids
            .iter()
            .map(Oid::to_snmp2)
            .collect::<Result<Vec<_>, _>>()?;
        let attempts = self.retries + 1;

        for attempt in 1..=attempts {
            match timeout(self.timeout, send(&mut self.session, op, &targets)).await {
                Ok(result) => return result,
                Err(_) => {
                    tracing::debug!(
                        request = op.name(),
                        attempt = attempt,
                        attempts = attempts,
                        "SNMP request timed out"
                    );
                }
            }
        }

        Err(SnmpError::Timeout {
            request: op.name(),
            attempts,
        })
    }
}

async fn send(
    session: &mut AsyncSession,
    op: Operation,
    targets: &[snmp2::Oid<'static>],
) -> Result<Vec<VarBind>, SnmpError> {
    let request_error = |e: snmp2::Error| SnmpError::Request {
        request: op.name(),
        message: e.to_string(),
    };

    let mut varbinds = Vec::new();

    if let Operation::GetBulk(max_repetitions) = op {
        let names: Vec<&snmp2::Oid> = targets.iter().collect();
        let pdu = session
            .getbulk(&names, 0, max_repetitions)
            .await
            .map_err(request_error)?;
        for (oid, value) in pdu.varbinds {
            varbinds.push((Oid::from_snmp2(&oid)?, SnmpValue::from_snmp2(&value)));
        }
        return Ok(varbinds);
    }

    for target in targets {
        let pdu = match op {
            Operation::GetNext => session.getnext(target).await,
            _ => session.get(target).await,
        }
        .map_err(request_error)?;

        for (oid, value) in pdu.varbinds {
            varbinds.push((Oid::from_snmp2(&oid)?, SnmpValue::from_snmp2(&value)));
        }
    }

    Ok(varbinds)
}

fn usm_security(user: &UsmUser) -> Result<snmp2::v3::Security, SnmpError> {
    use snmp2::v3::{Auth, AuthProtocol as V3Auth, Cipher, Security};

    let auth_protocol = match user.auth_protocol {
        None | Some(AuthProtocol::NoAuth) => None,
        Some(AuthProtocol::HmacMd5) => Some(V3Auth::Md5),
        Some(AuthProtocol::HmacSha) => Some(V3Auth::Sha1),
        Some(AuthProtocol::HmacSha224) => Some(V3Auth::Sha224),
        Some(AuthProtocol::HmacSha256) => Some(V3Auth::Sha256),
        Some(AuthProtocol::HmacSha384) => Some(V3Auth::Sha384),
        Some(AuthProtocol::HmacSha512) => Some(V3Auth::Sha512),
    };

    let cipher = match user.priv_protocol {
        None | Some(PrivProtocol::NoPriv) => None,
        Some(PrivProtocol::Des) => Some(Cipher::Des),
        Some(PrivProtocol::Aes128) => Some(Cipher::Aes128),
        Some(PrivProtocol::Aes192) => Some(Cipher::Aes192),
        Some(PrivProtocol::Aes256) => Some(Cipher::Aes256),
        Some(PrivProtocol::TripleDes) => {
            return Err(SnmpError::Session {
                target: user.user.clone(),
                message: "3DES privacy is not supported".to_string(),
            });
        }
    };

    let auth_key = user.auth_key.as_deref().unwrap_or_default();
    let security = Security::new(user.user.as_bytes(), auth_key.as_bytes());

    Ok(match (auth_protocol, cipher) {
        (None, _) => security.with_auth(Auth::NoAuthNoPriv),
        (Some(protocol), None) => security
            .with_auth_protocol(protocol)
            .with_auth(Auth::AuthNoPriv),
        (Some(protocol), Some(cipher)) => security.with_auth_protocol(protocol).with_auth(
            Auth::AuthPriv {
                cipher,
                privacy_password: user.priv_key.clone().unwrap_or_default().into_bytes(),
            },
        ),
    })
}

#[async_trait]
impl SnmpClient for Snmp2Client {
    async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        self.request(Operation::Get, oids).await
    }

    async fn get_next(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        self.request(Operation::GetNext, oids).await
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>, SnmpError> {
        self.request(Operation::GetBulk(max_repetitions), oids).await
    }
}

/// Connector opening [`Snmp2Client`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snmp2Connector;

#[async_trait]
impl SnmpConnector for Snmp2Connector {
    async fn connect(
        &self,
        target: &TransportTarget,
        auth: &AuthData,
    ) -> Result<Box<dyn SnmpClient>, SnmpError> {
        let client = Snmp2Client::connect(target, auth).await?;
        Ok(Box::new(client))
    }
}
