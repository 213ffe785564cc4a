//! Delimited-text export of a ledger
//!
//! Values are written verbatim: text containing a comma is neither quoted
//! nor escaped, so such a row shifts columns on import.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::Record;

/// Header row, in column order
pub const EXPORT_HEADERS: [&str; 10] = [
    "Semana",
    "Agricultor",
    "Lote",
    "Color de la Cinta",
    "Prematuro",
    "Presente",
    "Novedades",
    "Cosecha",
    "Embolse (calculado)",
    "Faltante (calculado)",
];

pub const EXPORT_FILE_PREFIX: &str = "Kua_AgroApp_Export";
pub const EXPORT_CONTENT_TYPE: &str = "text/csv;charset=utf-8;";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer error: {0}")]
    Writer(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A ready-to-download export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Render a computed quantity without trailing zeros (`12`, `2.5`, `-3`)
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// `Kua_AgroApp_Export_YYYY-MM-DD.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("{}_{}.csv", EXPORT_FILE_PREFIX, date.format("%Y-%m-%d"))
}

/// Header plus one comma-separated row per record, newline-joined with no
/// trailing newline.
pub fn to_delimited_text(records: &[Record]) -> Result<String, ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);

    wtr.write_record(EXPORT_HEADERS)?;
    for r in records {
        let week = r.week.to_string();
        let embolse = format_quantity(r.embolse);
        let faltante = format_quantity(r.faltante);
        wtr.write_record([
            week.as_str(),
            r.agricultor.as_str(),
            r.lote.label(),
            r.color.label(),
            r.prematuro.as_str(),
            r.presente.as_str(),
            r.novedades.as_str(),
            r.cosecha.as_str(),
            embolse.as_str(),
            faltante.as_str(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Writer(e.to_string()))?;
    let mut text = String::from_utf8(bytes)?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Build the download for `records`; `None` when there is nothing to export.
pub fn prepare_export(
    records: &[Record],
    exported_at: DateTime<Utc>,
) -> Result<Option<ExportFile>, ExportError> {
    if records.is_empty() {
        return Ok(None);
    }

    let text = to_delimited_text(records)?;
    Ok(Some(ExportFile {
        filename: export_filename(exported_at.date_naive()),
        content_type: EXPORT_CONTENT_TYPE,
        bytes: text.into_bytes(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lote, TapeColor};
    use crate::types::Identity;
    use chrono::TimeZone;

    fn sample(id: i64, week: i32, presente: &str) -> Record {
        Record {
            id,
            week,
            agricultor: Identity::parse("A7").unwrap(),
            lote: Lote::Lote2,
            color: TapeColor::Azul,
            prematuro: String::new(),
            presente: presente.to_string(),
            novedades: "2".to_string(),
            cosecha: "9".to_string(),
            embolse: Decimal::from(12),
            faltante: Decimal::from(3),
        }
    }

    #[test]
    fn test_header_only_for_empty_input() {
        let text = to_delimited_text(&[]).unwrap();
        assert_eq!(text, EXPORT_HEADERS.join(","));
    }

    #[test]
    fn test_example_row() {
        let text = to_delimited_text(&[sample(1, 11, "10")]).unwrap();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(
            lines[0],
            "Semana,Agricultor,Lote,Color de la Cinta,Prematuro,Presente,Novedades,Cosecha,Embolse (calculado),Faltante (calculado)"
        );
        assert_eq!(lines[1], "11,A7,Lote 2,Azul,,10,2,9,12,3");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_rows_keep_ledger_order() {
        let text = to_delimited_text(&[sample(2, 12, "7"), sample(1, 11, "10")]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("12,"));
        assert!(lines[2].starts_with("11,"));
    }

    #[test]
    fn test_values_are_not_quoted() {
        let mut record = sample(1, 11, "10");
        record.agricultor = Identity::parse("a,b").unwrap();
        record.color = TapeColor::CafeConNegro;
        let text = to_delimited_text(&[record]).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "11,A,B,Lote 2,Café con Negro,,10,2,9,12,3");
    }

    #[test]
    fn test_raw_counts_written_verbatim() {
        let mut record = sample(1, 11, "10.");
        record.embolse = Decimal::new(1250, 2);
        record.faltante = Decimal::new(-35, 1);
        let text = to_delimited_text(&[record]).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "11,A7,Lote 2,Azul,,10.,2,9,12.5,-3.5");
    }

    #[test]
    fn test_filename_uses_utc_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 0).unwrap();
        assert_eq!(export_filename(at.date_naive()), "Kua_AgroApp_Export_2024-03-15.csv");
    }

    #[test]
    fn test_prepare_export_disabled_when_empty() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();
        assert!(prepare_export(&[], at).unwrap().is_none());

        let file = prepare_export(&[sample(1, 11, "10")], at).unwrap().unwrap();
        assert_eq!(file.filename, "Kua_AgroApp_Export_2024-03-15.csv");
        assert_eq!(file.content_type, EXPORT_CONTENT_TYPE);
        assert!(file.bytes.ends_with(b"12,3"));
    }
}
