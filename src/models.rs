//! Application records persisted in SQLite.
//!
//! Pure pipeline types (chunks, format tags, context bundles) live in
//! `docqa-core`; these wrap them with identity, status and timestamps.

use anyhow::{anyhow, Result};
use docqa_core::{FormatTag, SourceRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "error" => Ok(DocumentStatus::Error),
            other => Err(anyhow!("unknown document status: {}", other)),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file and its processing outcome.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub format: FormatTag,
    pub size_bytes: i64,
    pub content_hash: String,
    pub storage_key: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub chunk_count: i64,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

/// A stored chunk as shown by `get`.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub index: i64,
    pub content: String,
}

/// A document together with its chunks in index order.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: DocumentRecord,
    pub chunks: Vec<ChunkRecord>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow!("unknown message role: {}", other)),
        }
    }
}

/// A persisted chat message. Assistant messages carry their citations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub sources: Vec<SourceRef>,
    pub created_at: String, // ISO8601
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
