// src/corrections.rs

use crate::error::{Error, Result};
use crate::heuristics::{ParsedFormat, parse_format};
use crate::line::RawLine;
use crate::units::UnitType;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

/// A user-confirmed reading of one vendor item's format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCorrectionEntry {
    pub format: String,
    pub unit_token: String,
    pub unit_type: UnitType,
    pub total_value: f64,
    pub pack_count: f64,
    pub unit_value: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub learned_at: OffsetDateTime,
}

impl VendorCorrectionEntry {
    /// Build an entry from a resolved format. Formats that still need review
    /// cannot be learned.
    pub fn from_parsed(parsed: &ParsedFormat, learned_at: OffsetDateTime) -> Option<Self> {
        if !parsed.is_authoritative() {
            return None;
        }
        Some(Self {
            format: parsed.display_form.clone(),
            unit_token: parsed.unit_token.clone()?,
            unit_type: parsed.unit_type?,
            total_value: parsed.total_value?,
            pack_count: parsed.pack_count?,
            unit_value: parsed.unit_value?,
            learned_at,
        })
    }

    pub fn to_parsed(&self) -> ParsedFormat {
        ParsedFormat {
            pack_count: Some(self.pack_count),
            unit_value: Some(self.unit_value),
            unit_token: Some(self.unit_token.clone()),
            unit_type: Some(self.unit_type),
            total_value: Some(self.total_value),
            needs_review: false,
            display_form: self.format.clone(),
        }
    }
}

/// Learned corrections, one map per vendor keyed by item identifier.
///
/// Reads happen on every line; writes only on explicit user correction, and a
/// second save for the same vendor and item replaces the first.
pub trait CorrectionStore {
    fn get_learned_correction(
        &self,
        vendor_id: &str,
        item: &str,
    ) -> Result<Option<VendorCorrectionEntry>>;

    fn save_correction(&self, vendor_id: &str, item: &str, entry: &VendorCorrectionEntry)
    -> Result<()>;

    /// All corrections for a vendor, ordered by item identifier.
    fn list_corrections(&self, vendor_id: &str) -> Result<Vec<(String, VendorCorrectionEntry)>>;
}

/// Parse the user-confirmed format text and learn it for the line's item.
pub fn apply_correction<S: CorrectionStore + ?Sized>(
    store: &S,
    vendor_id: &str,
    line: &RawLine,
    confirmed_format: &str,
) -> Result<VendorCorrectionEntry> {
    let item = line
        .item_identifier()
        .ok_or(Error::MissingItem(line.line_number))?;
    let parsed = parse_format(confirmed_format);
    let entry = VendorCorrectionEntry::from_parsed(&parsed, OffsetDateTime::now_utc())
        .ok_or_else(|| Error::AmbiguousCorrection(confirmed_format.trim().to_string()))?;
    store.save_correction(vendor_id, &item, &entry)?;
    Ok(entry)
}

#[derive(Debug, Default)]
pub struct MemoryCorrectionStore {
    vendors: RwLock<HashMap<String, HashMap<String, VendorCorrectionEntry>>>,
}

impl MemoryCorrectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorrectionStore for MemoryCorrectionStore {
    fn get_learned_correction(
        &self,
        vendor_id: &str,
        item: &str,
    ) -> Result<Option<VendorCorrectionEntry>> {
        let vendors = self.vendors.read().unwrap_or_else(PoisonError::into_inner);
        Ok(vendors
            .get(vendor_id)
            .and_then(|items| items.get(item))
            .cloned())
    }

    fn save_correction(
        &self,
        vendor_id: &str,
        item: &str,
        entry: &VendorCorrectionEntry,
    ) -> Result<()> {
        let mut vendors = self.vendors.write().unwrap_or_else(PoisonError::into_inner);
        vendors
            .entry(vendor_id.to_string())
            .or_default()
            .insert(item.to_string(), entry.clone());
        info!(vendor = %vendor_id, item = %item, format = %entry.format, "Correction saved");
        Ok(())
    }

    fn list_corrections(&self, vendor_id: &str) -> Result<Vec<(String, VendorCorrectionEntry)>> {
        let vendors = self.vendors.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = vendors
            .get(vendor_id)
            .map(|items| items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

/// Durable store backed by a single SQLite table.
pub struct SqliteCorrectionStore {
    conn: Connection,
}

/// Column values as stored, before the unit type and timestamp are checked.
struct CorrectionRow {
    format: String,
    unit_token: String,
    unit_type: String,
    total_value: f64,
    pack_count: f64,
    unit_value: f64,
    learned_at: String,
}

impl CorrectionRow {
    fn into_entry(self) -> Result<VendorCorrectionEntry> {
        let unit_type =
            UnitType::parse(&self.unit_type).ok_or(Error::UnknownUnitType(self.unit_type))?;
        let learned_at = OffsetDateTime::parse(&self.learned_at, &Rfc3339)
            .map_err(|e| Error::Timestamp(format!("{}: {e}", self.learned_at)))?;
        Ok(VendorCorrectionEntry {
            format: self.format,
            unit_token: self.unit_token,
            unit_type,
            total_value: self.total_value,
            pack_count: self.pack_count,
            unit_value: self.unit_value,
            learned_at,
        })
    }
}

impl SqliteCorrectionStore {
    /// Open (or create) the correction database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS vendor_corrections (
                vendor_id TEXT NOT NULL,
                item_key TEXT NOT NULL,
                format TEXT NOT NULL,
                unit_token TEXT NOT NULL,
                unit_type TEXT NOT NULL,
                total_value REAL NOT NULL,
                pack_count REAL NOT NULL,
                unit_value REAL NOT NULL,
                learned_at TEXT NOT NULL,
                PRIMARY KEY (vendor_id, item_key)
            )",
            [],
        )?;

        info!("Correction database initialized");
        Ok(Self { conn })
    }

    fn row_to_correction(row: &rusqlite::Row<'_>) -> rusqlite::Result<CorrectionRow> {
        Ok(CorrectionRow {
            format: row.get(0)?,
            unit_token: row.get(1)?,
            unit_type: row.get(2)?,
            total_value: row.get(3)?,
            pack_count: row.get(4)?,
            unit_value: row.get(5)?,
            learned_at: row.get(6)?,
        })
    }
}

impl CorrectionStore for SqliteCorrectionStore {
    fn get_learned_correction(
        &self,
        vendor_id: &str,
        item: &str,
    ) -> Result<Option<VendorCorrectionEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT format, unit_token, unit_type, total_value, pack_count, unit_value, learned_at
                 FROM vendor_corrections
                 WHERE vendor_id = ?1 AND item_key = ?2",
                params![vendor_id, item],
                Self::row_to_correction,
            )
            .optional()?;
        row.map(CorrectionRow::into_entry).transpose()
    }

    fn save_correction(
        &self,
        vendor_id: &str,
        item: &str,
        entry: &VendorCorrectionEntry,
    ) -> Result<()> {
        let learned_at = entry
            .learned_at
            .format(&Rfc3339)
            .map_err(|e| Error::Timestamp(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO vendor_corrections
                (vendor_id, item_key, format, unit_token, unit_type, total_value, pack_count, unit_value, learned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(vendor_id, item_key) DO UPDATE SET
                format = excluded.format,
                unit_token = excluded.unit_token,
                unit_type = excluded.unit_type,
                total_value = excluded.total_value,
                pack_count = excluded.pack_count,
                unit_value = excluded.unit_value,
                learned_at = excluded.learned_at",
            params![
                vendor_id,
                item,
                entry.format,
                entry.unit_token,
                entry.unit_type.as_str(),
                entry.total_value,
                entry.pack_count,
                entry.unit_value,
                learned_at,
            ],
        )?;
        info!(vendor = %vendor_id, item = %item, format = %entry.format, "Correction saved");
        Ok(())
    }

    fn list_corrections(&self, vendor_id: &str) -> Result<Vec<(String, VendorCorrectionEntry)>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_key, format, unit_token, unit_type, total_value, pack_count, unit_value, learned_at
             FROM vendor_corrections
             WHERE vendor_id = ?1
             ORDER BY item_key",
        )?;
        let rows = stmt.query_map(params![vendor_id], |row| {
            let item: String = row.get(0)?;
            Ok((
                item,
                CorrectionRow {
                    format: row.get(1)?,
                    unit_token: row.get(2)?,
                    unit_type: row.get(3)?,
                    total_value: row.get(4)?,
                    pack_count: row.get(5)?,
                    unit_value: row.get(6)?,
                    learned_at: row.get(7)?,
                },
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (item, row) = row?;
            entries.push((item, row.into_entry()?));
        }
        Ok(entries)
    }
}
