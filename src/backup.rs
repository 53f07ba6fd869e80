use anyhow::{anyhow, Context};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::facade::Snapshot;

const MANIFEST_ENTRY: &str = "manifest.json";
const SNAPSHOT_ENTRY: &str = "data/snapshot.json";
pub const BUNDLE_FORMAT_V1: &str = "disiplind-snapshot-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub bundle_id: String,
    pub sha256: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub bundle_id: Option<String>,
    pub exported_at: Option<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_snapshot_bundle(snap: &Snapshot, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let payload = serde_json::to_vec_pretty(snap).context("failed to serialize snapshot")?;
    let sha256 = sha256_hex(&payload);
    let bundle_id = Uuid::new_v4().to_string();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "bundleId": bundle_id,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": Utc::now().to_rfc3339(),
        "sha256": sha256,
        "counts": {
            "users": snap.store.users().len(),
            "violations": snap.store.violations().len(),
            "guidance": snap.store.guidance().len(),
            "logs": snap.logs.len(),
        },
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SNAPSHOT_ENTRY, opts)
        .context("failed to start snapshot entry")?;
    zip.write_all(&payload)
        .context("failed to write snapshot entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        bundle_id,
        sha256,
        entry_count: 2,
    })
}

/// Reads a bundle back. Nothing is applied here; the caller swaps state only
/// once the format and checksum have both been verified.
pub fn import_snapshot_bundle(in_path: &Path) -> anyhow::Result<(Snapshot, ImportSummary)> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut payload = Vec::new();
    archive
        .by_name(SNAPSHOT_ENTRY)
        .context("bundle missing data/snapshot.json")?
        .read_to_end(&mut payload)
        .context("failed to read snapshot entry")?;

    let expected = manifest.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
    let actual = sha256_hex(&payload);
    if expected != actual {
        return Err(anyhow!(
            "snapshot checksum mismatch: manifest {}, computed {}",
            expected,
            actual
        ));
    }

    let snap: Snapshot =
        serde_json::from_slice(&payload).context("data/snapshot.json is invalid")?;
    let text = |key: &str| manifest.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Ok((
        snap,
        ImportSummary {
            bundle_format_detected: format.to_string(),
            bundle_id: text("bundleId"),
            exported_at: text("exportedAt"),
        },
    ))
}
