
// src/provenance/mod.rs

//! Lineage records for one export run.
//!
//! Every stage of the pipeline hashes what it produced and links to the
//! record before it, so a written document can be traced back to the
//! results it was built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::VfmError;

/// Pipeline stage a record was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    ResultsLoaded,
    FieldsComputed,
    DocumentWritten,
}

/// A single link of the lineage chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub timestamp: DateTime<Utc>,
    pub stage: ExportStage,
    pub payload_digest: String,
    pub tool_version: String,
    pub previous_digest: Option<String>,
    pub details: serde_json::Value,
}

impl ProvenanceRecord {
    pub fn new(
        stage: ExportStage,
        payload: &[u8],
        previous_digest: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        ProvenanceRecord {
            timestamp: Utc::now(),
            stage,
            payload_digest: sha256_hex(payload),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            previous_digest,
            details,
        }
    }

    /// Digest of the whole record, used as the next record's link.
    pub fn digest(&self) -> Result<String, VfmError> {
        let serialized = serde_json::to_vec(self).map_err(|e| VfmError::Serialization(e.to_string()))?;
        Ok(sha256_hex(&serialized))
    }
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Ordered records of one run.
#[derive(Debug, Default)]
pub struct ProvenanceLog {
    records: Vec<ProvenanceRecord>,
}

impl ProvenanceLog {
    pub fn new() -> Self {
        ProvenanceLog { records: Vec::new() }
    }

    /// Appends a record for `stage`, linked to the previous one.
    pub fn record(
        &mut self,
        stage: ExportStage,
        payload: &[u8],
        details: serde_json::Value,
    ) -> Result<&ProvenanceRecord, VfmError> {
        let previous_digest = match self.records.last() {
            Some(last) => Some(last.digest()?),
            None => None,
        };
        self.records.push(ProvenanceRecord::new(stage, payload, previous_digest, details));
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    pub fn records(&self) -> &[ProvenanceRecord] {
        &self.records
    }

    pub fn to_json(&self) -> Result<String, VfmError> {
        serde_json::to_string_pretty(&self.records).map_err(|e| VfmError::Serialization(e.to_string()))
    }

    pub fn into_records(self) -> Vec<ProvenanceRecord> {
        self.records
    }
}
