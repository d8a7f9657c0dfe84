use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{AppError, AppResult};
use crate::faces::similarity::max_abs;

/// Label recorded alongside serialized embeddings.
pub const EMBEDDING_ENCODING: &str = "f64le-base64";
const VALUE_WIDTH: usize = std::mem::size_of::<f64>();

/// A face embedding produced by the recognition backend.
///
/// On the storage boundary an embedding is a fixed-width little-endian `f64`
/// array encoded as base64, so values survive a round trip bit for bit.
#[derive(Clone, PartialEq)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rejects vectors that can never produce a defined cosine similarity.
    pub fn validate(&self) -> AppResult<()> {
        if self.0.is_empty() {
            return Err(AppError::DegenerateEmbedding(
                "embedding vector is empty".into(),
            ));
        }
        if self.0.iter().any(|value| !value.is_finite()) {
            return Err(AppError::DegenerateEmbedding(
                "embedding contains non-finite values".into(),
            ));
        }
        if max_abs(&self.0).is_none() {
            return Err(AppError::DegenerateEmbedding(
                "embedding has zero magnitude".into(),
            ));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() * VALUE_WIDTH);
        for value in &self.0 {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() % VALUE_WIDTH != 0 {
            return Err(format!(
                "payload of {} bytes is not a multiple of {VALUE_WIDTH}",
                bytes.len()
            ));
        }
        let values = bytes
            .chunks_exact(VALUE_WIDTH)
            .map(|chunk| {
                let mut raw = [0u8; VALUE_WIDTH];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Ok(Self(values))
    }

    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(self.to_bytes())
    }

    pub fn decode(text: &str) -> Result<Self, String> {
        let bytes = general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|err| format!("invalid base64 payload: {err}"))?;
        Self::from_bytes(&bytes)
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl AsRef<[f64]> for Embedding {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl fmt::Debug for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedding")
            .field("len", &self.0.len())
            .field("head", &&self.0[..self.0.len().min(4)])
            .finish()
    }
}

impl Serialize for Embedding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Embedding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Embedding::decode(&text).map_err(de::Error::custom)
    }
}
