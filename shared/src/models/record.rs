//! Committed field records and the per-identity ledger document

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Lote, TapeColor};
use crate::types::Identity;

/// A committed, immutable bagging/harvest count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Commit time in Unix milliseconds, unique within a ledger
    pub id: i64,
    pub week: i32,
    pub agricultor: Identity,
    pub lote: Lote,
    pub color: TapeColor,
    pub prematuro: String,
    pub presente: String,
    pub novedades: String,
    pub cosecha: String,
    pub embolse: Decimal,
    pub faltante: Decimal,
}

/// Full remote document for one identity; records are newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerDocument {
    #[serde(default)]
    pub records: Vec<Record>,
}

impl LedgerDocument {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pick the id for a record committed at `now_ms` so it stays unique among
/// `existing` even when two commits land in the same millisecond.
pub fn next_record_id(now_ms: i64, existing: &[Record]) -> i64 {
    match existing.iter().map(|r| r.id).max() {
        Some(max) if max >= now_ms => max.saturating_add(1),
        _ => now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> Record {
        Record {
            id,
            week: 11,
            agricultor: Identity::parse("A7").unwrap(),
            lote: Lote::Lote2,
            color: TapeColor::Azul,
            prematuro: String::new(),
            presente: "10".to_string(),
            novedades: "2".to_string(),
            cosecha: "9".to_string(),
            embolse: Decimal::from(12),
            faltante: Decimal::from(3),
        }
    }

    #[test]
    fn test_document_without_records_key_is_empty() {
        let doc: LedgerDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record(42)).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["week"], 11);
        assert_eq!(json["agricultor"], "A7");
        assert_eq!(json["lote"], "Lote 2");
        assert_eq!(json["color"], "Azul");
        assert_eq!(json["prematuro"], "");
        assert_eq!(json["embolse"], "12");
        assert_eq!(json["faltante"], "3");
    }

    #[test]
    fn test_numeric_quantities_are_accepted() {
        let json = r#"{
            "id": 1710504000000, "week": 11, "agricultor": "A7",
            "lote": "Lote 2", "color": "Azul", "prematuro": "",
            "presente": "10", "novedades": "2", "cosecha": "8.5",
            "embolse": 12, "faltante": 3.5
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.embolse, Decimal::from(12));
        assert_eq!(record.faltante, Decimal::new(35, 1));

        // Written back as exact decimal strings
        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written["faltante"], "3.5");
    }

    #[test]
    fn test_document_round_trips_through_json() {
        let doc = LedgerDocument::new(vec![record(2), record(1)]);
        let text = serde_json::to_string(&doc).unwrap();
        let back: LedgerDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_next_record_id() {
        assert_eq!(next_record_id(100, &[]), 100);
        assert_eq!(next_record_id(100, &[record(50)]), 100);
        assert_eq!(next_record_id(100, &[record(100)]), 101);
        assert_eq!(next_record_id(100, &[record(90), record(140)]), 141);
    }
}
