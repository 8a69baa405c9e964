//! Dump container: a zip archive holding `manifest.json` and one
//! `tables/<name>.json` entry per dumped table.
//!
//! Each table entry is a JSON array of rows; every row is an ordered object
//! of `column -> {"type": ..., "value": ...}`, which keeps the value types
//! lossless across a round trip.

use std::io::{Cursor, Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tenvault_core::row::DataRowInfo;
use tenvault_core::types::{TenantId, Timestamp};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Current container layout version.
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Errors reading or writing a dump container.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported dump format version {0}")]
    UnsupportedVersion(u32),

    #[error("Dump entry '{0}' is missing")]
    MissingEntry(String),
}

/// Manifest entry describing one dumped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub module: String,
    pub rows: usize,
    /// Archive path of the table's rows.
    pub entry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpManifest {
    pub format_version: u32,
    pub created_at: Timestamp,
    pub source_tenant: TenantId,
    pub modules: Vec<String>,
    pub tables: Vec<TableEntry>,
}

/// A decoded dump: manifest plus rows per table, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpContainer {
    pub manifest: DumpManifest,
    pub tables: IndexMap<String, Vec<DataRowInfo>>,
}

impl DumpContainer {
    pub fn new(source_tenant: TenantId, modules: Vec<String>, created_at: Timestamp) -> Self {
        Self {
            manifest: DumpManifest {
                format_version: FORMAT_VERSION,
                created_at,
                source_tenant,
                modules,
                tables: Vec::new(),
            },
            tables: IndexMap::new(),
        }
    }

    /// Append a table's rows and its manifest entry.
    pub fn push_table(&mut self, name: &str, module: &str, rows: Vec<DataRowInfo>) {
        self.manifest.tables.push(TableEntry {
            name: name.to_string(),
            module: module.to_string(),
            rows: rows.len(),
            entry: table_entry_path(name),
        });
        self.tables.insert(name.to_string(), rows);
    }

    pub fn rows(&self, table: &str) -> Option<&[DataRowInfo]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

pub fn table_entry_path(table: &str) -> String {
    format!("tables/{table}.json")
}

/// Encode a container as zip bytes.
pub fn write_container(container: &DumpContainer) -> Result<Vec<u8>, FormatError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, options.clone())?;
    zip.write_all(&serde_json::to_vec_pretty(&container.manifest)?)?;

    for entry in &container.manifest.tables {
        let rows = container
            .tables
            .get(&entry.name)
            .ok_or_else(|| FormatError::MissingEntry(entry.entry.clone()))?;
        zip.start_file(entry.entry.as_str(), options.clone())?;
        zip.write_all(&serde_json::to_vec(rows)?)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Decode zip bytes produced by [`write_container`].
pub fn read_container(bytes: &[u8]) -> Result<DumpContainer, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let manifest: DumpManifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(manifest.format_version));
    }

    let mut tables = IndexMap::new();
    for entry in &manifest.tables {
        let rows: Vec<DataRowInfo> = serde_json::from_slice(&read_entry(&mut archive, &entry.entry)?)?;
        tables.insert(entry.name.clone(), rows);
    }

    Ok(DumpContainer { manifest, tables })
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>, FormatError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(FormatError::MissingEntry(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
