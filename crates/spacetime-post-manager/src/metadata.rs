// crates/spacetime-post-manager/src/metadata.rs

//! Plot metadata: the lightweight, JSON-persisted registry entry per
//! plot. Distinct from the plot's own on-disk header — this is
//! bookkeeping the manager keeps about *where* a plot lives and whether it
//! currently loads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a registered plot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotStatus {
    /// The plot file opens, its header parses, and its size is consistent.
    Valid,
    /// The plot file exists but its header or body failed validation.
    Corrupted,
    /// The plot file is absent from disk.
    Missing,
}

/// Registry entry for one plot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMetadata {
    /// Local identity for this plot within this manager's registry.
    #[serde(rename = "plotId")]
    pub plot_id: Uuid,
    /// Path to the plot file on disk.
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Path to the sibling cache file, if one is tracked.
    #[serde(rename = "cacheFilePath")]
    pub cache_file_path: String,
    /// Observed file size in bytes at the time of last (re)registration.
    #[serde(rename = "spaceAllocatedBytes")]
    pub space_allocated_bytes: u64,
    /// Copy of the plot header's Merkle root.
    #[serde(
        rename = "merkleRoot",
        serialize_with = "serialize_root_base64",
        deserialize_with = "deserialize_root_base64"
    )]
    pub merkle_root: [u8; 32],
    /// When this plot was first registered.
    #[serde(rename = "createdAtUtc")]
    pub created_at_utc: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: PlotStatus,
}

fn serialize_root_base64<S>(root: &[u8; 32], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&BASE64.encode(root))
}

fn deserialize_root_base64<'de, D>(d: D) -> Result<[u8; 32], D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    let bytes = BASE64
        .decode(s.as_bytes())
        .map_err(serde::de::Error::custom)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| serde::de::Error::custom("merkleRoot must decode to exactly 32 bytes"))?;
    Ok(arr)
}

/// Unknown status strings deserialize to [`PlotStatus::Missing`] rather
/// than failing the whole document. We model this with a permissive
/// wrapper used only at the document boundary.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientStatus {
    Known(PlotStatus),
    Unknown(String),
}

/// A single registry entry as read from disk, tolerating an unknown
/// `status` string (mapped to `Missing`) without rejecting the document.
#[derive(Deserialize)]
struct LenientEntry {
    #[serde(rename = "plotId")]
    plot_id: Uuid,
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "cacheFilePath")]
    cache_file_path: String,
    #[serde(rename = "spaceAllocatedBytes")]
    space_allocated_bytes: u64,
    #[serde(rename = "merkleRoot")]
    merkle_root_b64: String,
    #[serde(rename = "createdAtUtc")]
    created_at_utc: DateTime<Utc>,
    status: LenientStatus,
}

/// Parse a metadata JSON document into a list of entries.
///
/// A malformed document (invalid JSON, or a well-formed-but-wrong shape)
/// is treated as empty rather than propagated as an error. Entries with
/// an unrecognized `status` string deserialize to [`PlotStatus::Missing`];
/// entries whose `merkleRoot` fails to base64-decode are dropped
/// individually rather than invalidating the whole document.
#[must_use]
pub fn parse_registry_document(bytes: &[u8]) -> Vec<PlotMetadata> {
    let Ok(raw) = serde_json::from_slice::<Vec<LenientEntry>>(bytes) else {
        return Vec::new();
    };
    raw.into_iter()
        .filter_map(|e| {
            let decoded = BASE64.decode(e.merkle_root_b64.as_bytes()).ok()?;
            let merkle_root: [u8; 32] = decoded.try_into().ok()?;
            let status = match e.status {
                LenientStatus::Known(s) => s,
                LenientStatus::Unknown(_) => PlotStatus::Missing,
            };
            Some(PlotMetadata {
                plot_id: e.plot_id,
                file_path: e.file_path,
                cache_file_path: e.cache_file_path,
                space_allocated_bytes: e.space_allocated_bytes,
                merkle_root,
                created_at_utc: e.created_at_utc,
                status,
            })
        })
        .collect()
}

/// Serialize a list of entries to the registry's JSON array format.
///
/// # Errors
///
/// Propagates any `serde_json` serialization failure (practically
/// infallible for this data shape).
pub fn serialize_registry_document(entries: &[PlotMetadata]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlotMetadata {
        PlotMetadata {
            plot_id: Uuid::new_v4(),
            file_path: "/plots/a.plot".into(),
            cache_file_path: String::new(),
            space_allocated_bytes: 123,
            merkle_root: [7u8; 32],
            created_at_utc: Utc::now(),
            status: PlotStatus::Valid,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let entries = vec![sample()];
        let bytes = serialize_registry_document(&entries).unwrap();
        let parsed = parse_registry_document(&bytes);
        assert_eq!(parsed, entries);
    }

    #[test]
    fn merkle_root_is_base64_in_json() {
        let entries = vec![sample()];
        let bytes = serialize_registry_document(&entries).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(&BASE64.encode([7u8; 32])));
    }

    #[test]
    fn malformed_json_parses_as_empty() {
        assert!(parse_registry_document(b"not json at all").is_empty());
        assert!(parse_registry_document(b"").is_empty());
        assert!(parse_registry_document(b"{\"oops\": true}").is_empty());
    }

    #[test]
    fn truncated_array_parses_as_empty() {
        let mut entries = vec![sample()];
        entries.push(sample());
        let mut bytes = serialize_registry_document(&entries).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(parse_registry_document(&bytes).is_empty());
    }

    #[test]
    fn unknown_status_string_becomes_missing() {
        let e = sample();
        let json = format!(
            r#"[{{"plotId":"{}","filePath":"{}","cacheFilePath":"","spaceAllocatedBytes":1,"merkleRoot":"{}","createdAtUtc":"{}","status":"Frobnicated"}}]"#,
            e.plot_id,
            e.file_path,
            BASE64.encode(e.merkle_root),
            e.created_at_utc.to_rfc3339(),
        );
        let parsed = parse_registry_document(json.as_bytes());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].status, PlotStatus::Missing);
    }
}
