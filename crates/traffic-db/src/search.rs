//! RediSearch queries used to rebuild the latest snapshot at startup.
//!
//! Packet records are Redis hashes under the `packet:` prefix, indexed as
//! `idx:packets` with numeric `timestamp` and `total_bytes` fields.
//!
//! # Commands
//!
//! | Step | Command |
//! |------|---------|
//! | Probe | `FT.INFO idx:packets` |
//! | Create | `FT.CREATE idx:packets ON HASH PREFIX 1 packet: SCHEMA timestamp NUMERIC total_bytes NUMERIC` |
//! | Max timestamp | `FT.AGGREGATE idx:packets * GROUPBY 0 REDUCE MAX 1 @timestamp AS max_timestamp` |
//! | Records | `FT.SEARCH idx:packets "@timestamp:[T T]" LIMIT 0 {limit}` |
//!
//! Replies are read in their RESP2 array form.

use fred::prelude::*;
use fred::types::{ClusterHash, CustomCommand, Value};
use serde_json::{Map, Value as Json};
use tracing::{debug, info};
use traffic_core::LatestIndex;

use crate::error::DbError;

/// Name of the packet index.
pub const PACKET_INDEX: &str = "idx:packets";

/// Key prefix of indexed packet hashes.
pub const PACKET_PREFIX: &str = "packet:";

/// Maximum number of records fetched for the latest timestamp by default.
pub const DEFAULT_SEARCH_LIMIT: usize = 10_000;

/// The RediSearch-backed [`LatestIndex`].
#[derive(Clone)]
pub struct PacketIndex {
    client: Client,
    search_limit: usize,
}

impl PacketIndex {
    /// Wrap an already connected client.
    pub const fn new(client: Client, search_limit: usize) -> Self {
        Self {
            client,
            search_limit,
        }
    }

    /// Connect to Redis at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the URL is invalid or the connection fails.
    pub async fn connect(url: &str, search_limit: usize) -> Result<Self, DbError> {
        let client = crate::connect(url).await?;
        Ok(Self::new(client, search_limit))
    }

    /// Close the connection. Errors are ignored.
    pub async fn close(&self) {
        if let Err(e) = self.client.quit().await {
            debug!(error = %e, "Failed to close index connection");
        }
    }

    async fn command(&self, name: &'static str, args: Vec<String>) -> Result<Value, DbError> {
        let cmd = CustomCommand::new_static(name, ClusterHash::FirstKey, false);
        let reply: Value = self.client.custom(cmd, args).await?;
        Ok(reply)
    }
}

impl LatestIndex for PacketIndex {
    type Error = DbError;

    async fn ensure_index(&self) -> Result<(), DbError> {
        if self
            .command("FT.INFO", vec![PACKET_INDEX.to_owned()])
            .await
            .is_ok()
        {
            debug!(index = PACKET_INDEX, "Index already exists");
            return Ok(());
        }

        self.command("FT.CREATE", create_index_args()).await?;
        info!(index = PACKET_INDEX, "Index created");
        Ok(())
    }

    async fn max_timestamp(&self) -> Result<Option<i64>, DbError> {
        let reply = self.command("FT.AGGREGATE", max_timestamp_args()).await?;
        parse_max_timestamp(reply)
    }

    async fn records_at(&self, timestamp: i64) -> Result<Vec<Json>, DbError> {
        let reply = self
            .command("FT.SEARCH", search_args(timestamp, self.search_limit))
            .await?;
        let records = parse_search_docs(reply)?;
        debug!(timestamp, records = records.len(), "Fetched latest packets");
        Ok(records)
    }
}

// =========================================================================
// Command arguments
// =========================================================================

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_owned()).collect()
}

fn create_index_args() -> Vec<String> {
    args(&[
        PACKET_INDEX,
        "ON",
        "HASH",
        "PREFIX",
        "1",
        PACKET_PREFIX,
        "SCHEMA",
        "timestamp",
        "AS",
        "timestamp",
        "NUMERIC",
        "total_bytes",
        "AS",
        "total_bytes",
        "NUMERIC",
    ])
}

fn max_timestamp_args() -> Vec<String> {
    args(&[
        PACKET_INDEX,
        "*",
        "GROUPBY",
        "0",
        "REDUCE",
        "MAX",
        "1",
        "@timestamp",
        "AS",
        "max_timestamp",
    ])
}

fn search_args(timestamp: i64, limit: usize) -> Vec<String> {
    vec![
        PACKET_INDEX.to_owned(),
        format!("@timestamp:[{timestamp} {timestamp}]"),
        "LIMIT".to_owned(),
        "0".to_owned(),
        limit.to_string(),
    ]
}

// =========================================================================
// Reply parsing
// =========================================================================

fn expect_array(command: &'static str, value: Value) -> Result<Vec<Value>, DbError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(DbError::UnexpectedReply {
            command,
            detail: format!("expected an array, got {other:?}"),
        }),
    }
}

/// Pair up a flat `[k1, v1, k2, v2, ...]` list. Keys that are not strings are skipped.
fn field_pairs(fields: Vec<Value>) -> Vec<(String, Value)> {
    let mut pairs = Vec::with_capacity(fields.len() / 2);
    let mut iter = fields.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if let Some(key) = key.as_string() {
            pairs.push((key, value));
        }
    }
    pairs
}

/// Parse `[count, [max_timestamp, value]]`.
///
/// An empty reply, a missing field, or RediSearch's `-inf` for an empty
/// group all mean "no records".
fn parse_max_timestamp(reply: Value) -> Result<Option<i64>, DbError> {
    let Some(row) = expect_array("FT.AGGREGATE", reply)?.into_iter().nth(1) else {
        return Ok(None);
    };

    let raw = field_pairs(expect_array("FT.AGGREGATE", row)?)
        .into_iter()
        .find(|(key, _)| key == "max_timestamp")
        .and_then(|(_, value)| value.as_string());

    raw.map_or(Ok(None), |raw| parse_timestamp(&raw))
}

fn parse_timestamp(raw: &str) -> Result<Option<i64>, DbError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("-inf") {
        return Ok(None);
    }

    let integral = match trimmed.split_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b == b'0') => whole,
        Some(_) => return Err(DbError::MalformedTimestamp(raw.to_owned())),
        None => trimmed,
    };

    integral
        .parse::<i64>()
        .map(Some)
        .map_err(|e| DbError::MalformedTimestamp(format!("{raw}: {e}")))
}

/// Parse `[total, id1, [f, v, ...], id2, [f, v, ...], ...]` into JSON objects.
///
/// Hash values are kept as strings, as stored.
fn parse_search_docs(reply: Value) -> Result<Vec<Json>, DbError> {
    let mut items = expect_array("FT.SEARCH", reply)?.into_iter().skip(1);
    let mut records = Vec::new();

    while let Some(id) = items.next() {
        let Some(fields) = items.next() else {
            return Err(DbError::UnexpectedReply {
                command: "FT.SEARCH",
                detail: format!("document {id:?} has no field list"),
            });
        };

        let mut record = Map::new();
        for (key, value) in field_pairs(expect_array("FT.SEARCH", fields)?) {
            record.insert(key, Json::String(value.as_string().unwrap_or_default()));
        }
        records.push(Json::Object(record));
    }

    Ok(records)
}
