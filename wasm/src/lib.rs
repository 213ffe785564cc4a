//! WebAssembly module for Kua AgroApp
//!
//! Provides client-side computation for:
//! - ISO week anchoring
//! - Count input checks and derived quantities
//! - Draft commit and record ids
//! - Offline CSV export

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use shared::{
    export_filename, iso_week_number, next_record_id, prepare_export, Draft, Identity,
    LedgerDocument, Lote, Record, TapeColor,
};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("Kua AgroApp module loaded"));
}

fn to_js_error(message: String) -> JsValue {
    web_sys::console::error_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

/// Device-local calendar date
fn today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(
        now.get_full_year() as i32,
        now.get_month() + 1,
        now.get_date(),
    )
}

/// The current instant; export filenames are dated in UTC
fn now_utc() -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(js_sys::Date::now() as i64).single()
}

/// ISO week of a calendar date, 0 when the date does not exist
#[wasm_bindgen]
pub fn iso_week(year: i32, month: u32, day: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, day).map_or(0, iso_week_number)
}

/// ISO week of today on this device
#[wasm_bindgen]
pub fn current_week() -> u32 {
    today().map_or(0, iso_week_number)
}

/// Whether a keystroke leaves a count field acceptable
#[wasm_bindgen]
pub fn is_valid_count_input(raw: &str) -> bool {
    shared::is_partial_decimal(raw)
}

/// Farmer code as used for the ledger document, or an error for blank input
#[wasm_bindgen]
pub fn normalize_farmer_code(code: &str) -> Result<String, JsValue> {
    normalize_code(code).map_err(to_js_error)
}

fn normalize_code(code: &str) -> Result<String, String> {
    Identity::parse(code)
        .map(|identity| identity.as_str().to_string())
        .map_err(|e| e.message_es())
}

/// `{"embolse": "...", "faltante": "..."}` for the given count text
#[wasm_bindgen]
pub fn calculate_derived(presente: &str, novedades: &str, cosecha: &str) -> String {
    derived_json(presente, novedades, cosecha)
}

fn derived_json(presente: &str, novedades: &str, cosecha: &str) -> String {
    let draft = Draft {
        presente: presente.to_string(),
        novedades: novedades.to_string(),
        cosecha: cosecha.to_string(),
        ..Draft::default()
    };
    let derived = draft.derived_fields();
    serde_json::json!({
        "embolse": shared::format_quantity(derived.embolse),
        "faltante": shared::format_quantity(derived.faltante),
    })
    .to_string()
}

#[derive(Serialize)]
struct CommitResult {
    record: Record,
    draft: Draft,
}

/// Turn a draft into a record; returns the record and the draft with its
/// counts cleared
#[wasm_bindgen]
pub fn commit_draft(draft_json: &str, id: f64, week: i32, code: &str) -> Result<String, JsValue> {
    commit(draft_json, id as i64, week, code).map_err(to_js_error)
}

fn commit(draft_json: &str, id: i64, week: i32, code: &str) -> Result<String, String> {
    let mut draft: Draft =
        serde_json::from_str(draft_json).map_err(|e| format!("Invalid draft JSON: {}", e))?;
    let identity = Identity::parse(code).map_err(|e| e.message_es())?;
    let record = draft.commit(id, week, &identity);
    serde_json::to_string(&CommitResult { record, draft }).map_err(|e| e.to_string())
}

/// Id for a record committed at `now_ms`, unique within the ledger
#[wasm_bindgen]
pub fn record_id_for(now_ms: f64, ledger_json: &str) -> Result<f64, JsValue> {
    record_id(now_ms as i64, ledger_json)
        .map(|id| id as f64)
        .map_err(to_js_error)
}

fn record_id(now_ms: i64, ledger_json: &str) -> Result<i64, String> {
    let ledger: LedgerDocument =
        serde_json::from_str(ledger_json).map_err(|e| format!("Invalid ledger JSON: {}", e))?;
    Ok(next_record_id(now_ms, &ledger.records))
}

/// CSV text of a ledger document, or `undefined` when there is nothing to
/// export
#[wasm_bindgen]
pub fn export_csv(ledger_json: &str) -> Result<Option<String>, JsValue> {
    let exported_at = now_utc().ok_or_else(|| to_js_error("Invalid clock".to_string()))?;
    export_text(ledger_json, exported_at).map_err(to_js_error)
}

fn export_text(ledger_json: &str, exported_at: DateTime<Utc>) -> Result<Option<String>, String> {
    let ledger: LedgerDocument =
        serde_json::from_str(ledger_json).map_err(|e| format!("Invalid ledger JSON: {}", e))?;
    match prepare_export(&ledger.records, exported_at).map_err(|e| e.to_string())? {
        Some(file) => String::from_utf8(file.bytes)
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

/// Download name for an export made now
#[wasm_bindgen]
pub fn export_filename_today() -> String {
    now_utc()
        .map(|now| export_filename(now.date_naive()))
        .unwrap_or_default()
}

/// Lot labels in display order, as a JSON array
#[wasm_bindgen]
pub fn lote_options() -> String {
    let labels: Vec<&str> = Lote::ALL.iter().map(Lote::label).collect();
    serde_json::to_string(&labels).unwrap_or_default()
}

/// Tape color labels in display order, as a JSON array
#[wasm_bindgen]
pub fn tape_color_options() -> String {
    let labels: Vec<&str> = TapeColor::ALL.iter().map(TapeColor::label).collect();
    serde_json::to_string(&labels).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_week() {
        assert_eq!(iso_week(2024, 3, 15), 11);
        assert_eq!(iso_week(2024, 1, 1), 1);
        assert_eq!(iso_week(2023, 12, 31), 52);
        assert_eq!(iso_week(2023, 2, 30), 0);
    }

    #[test]
    fn test_derived_quantities() {
        let derived: serde_json::Value =
            serde_json::from_str(&derived_json("10", "2", "9")).unwrap();
        assert_eq!(derived["embolse"], "12");
        assert_eq!(derived["faltante"], "3");

        let empty: serde_json::Value = serde_json::from_str(&derived_json("", ".", "")).unwrap();
        assert_eq!(empty["embolse"], "0");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" a7 ").unwrap(), "A7");
        assert!(normalize_code("   ").is_err());
    }

    #[test]
    fn test_commit_clears_counts() {
        let draft = serde_json::to_string(&Draft {
            lote: Lote::Lote2,
            color: TapeColor::Azul,
            presente: "10".to_string(),
            novedades: "2".to_string(),
            cosecha: "9".to_string(),
            ..Draft::default()
        })
        .unwrap();

        let result: serde_json::Value =
            serde_json::from_str(&commit(&draft, 42, 11, "a7").unwrap()).unwrap();
        assert_eq!(result["record"]["agricultor"], "A7");
        assert_eq!(result["record"]["lote"], "Lote 2");
        assert_eq!(result["draft"]["presente"], "");
        assert_eq!(result["draft"]["color"], "Azul");
    }

    #[test]
    fn test_export_from_ledger_json() {
        let draft = Draft {
            lote: Lote::Lote2,
            color: TapeColor::Azul,
            presente: "10".to_string(),
            novedades: "2".to_string(),
            cosecha: "9".to_string(),
            ..Draft::default()
        };
        let identity = Identity::parse("A7").unwrap();
        let ledger = LedgerDocument::new(vec![draft.to_record(7, 11, &identity)]);
        let json = serde_json::to_string(&ledger).unwrap();

        let text = export_text(&json, Utc::now()).unwrap().unwrap();
        assert!(text.ends_with("\n11,A7,Lote 2,Azul,,10,2,9,12,3"));
        assert_eq!(record_id(7, &json).unwrap(), 8);
        assert_eq!(record_id(100, &json).unwrap(), 100);
    }

    #[test]
    fn test_empty_ledger_exports_nothing() {
        assert_eq!(export_text(r#"{"records":[]}"#, Utc::now()).unwrap(), None);
        assert_eq!(export_text("{}", Utc::now()).unwrap(), None);
        assert!(export_text("not json", Utc::now()).is_err());
    }

    #[test]
    fn test_option_lists() {
        let colors: Vec<String> = serde_json::from_str(&tape_color_options()).unwrap();
        assert_eq!(colors.len(), 9);
        assert!(colors.contains(&"Café con Negro".to_string()));
        let lotes: Vec<String> = serde_json::from_str(&lote_options()).unwrap();
        assert_eq!(lotes, vec!["Lote 1", "Lote 2", "Lote 3", "Lote 4"]);
    }
}
