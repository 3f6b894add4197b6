//! Wire encoding of submissions published to the agent.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Serialization format for check submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON, readable when tailing the agent's key space.
    #[default]
    Json,

    /// CBOR, for checks submitting many samples per run.
    Cbor,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Cbor => f.write_str("cbor"),
        }
    }
}

/// Encode a submission in the given format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    let encoded = match format {
        Format::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)
                .map(|()| buf)
                .map_err(|e| e.to_string())
        }
    };

    encoded.map_err(|message| Error::Encode { format, message })
}

/// Decode a submission published in the given format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    let decoded = match format {
        Format::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| e.to_string()),
    };

    decoded.map_err(|message| Error::Decode { format, message })
}
