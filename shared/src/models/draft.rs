//! Draft field record under construction

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Lote, Record, TapeColor};
use crate::types::Identity;
use crate::validation::{is_partial_decimal, parse_count, ValidationError};

/// Form field addressed by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftField {
    Lote,
    Color,
    Prematuro,
    Presente,
    Novedades,
    Cosecha,
}

impl DraftField {
    pub fn name(&self) -> &'static str {
        match self {
            DraftField::Lote => "lote",
            DraftField::Color => "color",
            DraftField::Prematuro => "prematuro",
            DraftField::Presente => "presente",
            DraftField::Novedades => "novedades",
            DraftField::Cosecha => "cosecha",
        }
    }

    /// The four free-typed count fields
    pub fn is_count(&self) -> bool {
        !matches!(self, DraftField::Lote | DraftField::Color)
    }
}

impl std::str::FromStr for DraftField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lote" => Ok(DraftField::Lote),
            "color" => Ok(DraftField::Color),
            "prematuro" => Ok(DraftField::Prematuro),
            "presente" => Ok(DraftField::Presente),
            "novedades" => Ok(DraftField::Novedades),
            "cosecha" => Ok(DraftField::Cosecha),
            other => Err(ValidationError::UnknownField(other.to_string())),
        }
    }
}

/// Outcome of a keystroke applied to the draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Applied,
    Rejected(ValidationError),
}

impl FieldUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, FieldUpdate::Applied)
    }
}

/// Quantities computed from the draft, never typed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DerivedFields {
    /// presente + novedades
    pub embolse: Decimal,
    /// embolse - cosecha; negative when more was harvested than bagged
    pub faltante: Decimal,
}

impl DerivedFields {
    pub fn is_shortfall_negative(&self) -> bool {
        self.faltante.is_sign_negative() && !self.faltante.is_zero()
    }
}

/// In-progress field record.
///
/// Count fields hold the raw typed text: empty or a (possibly partial)
/// unsigned decimal. Lot and color are sticky across commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Draft {
    pub lote: Lote,
    pub color: TapeColor,
    pub prematuro: String,
    pub presente: String,
    pub novedades: String,
    pub cosecha: String,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply raw input to a field.
    ///
    /// Count fields keep the text verbatim when it is a partial decimal and
    /// ignore the keystroke otherwise. Lot and color must name one of
    /// their options.
    pub fn update_field(&mut self, field: DraftField, raw: &str) -> FieldUpdate {
        match field {
            DraftField::Lote => match raw.parse::<Lote>() {
                Ok(lote) => {
                    self.lote = lote;
                    FieldUpdate::Applied
                }
                Err(e) => FieldUpdate::Rejected(e),
            },
            DraftField::Color => match raw.parse::<TapeColor>() {
                Ok(color) => {
                    self.color = color;
                    FieldUpdate::Applied
                }
                Err(e) => FieldUpdate::Rejected(e),
            },
            _ => {
                if !is_partial_decimal(raw) {
                    return FieldUpdate::Rejected(ValidationError::InvalidNumber {
                        field: field.name(),
                    });
                }
                if let Some(slot) = self.count_mut(field) {
                    *slot = raw.to_string();
                }
                FieldUpdate::Applied
            }
        }
    }

    fn count_mut(&mut self, field: DraftField) -> Option<&mut String> {
        match field {
            DraftField::Prematuro => Some(&mut self.prematuro),
            DraftField::Presente => Some(&mut self.presente),
            DraftField::Novedades => Some(&mut self.novedades),
            DraftField::Cosecha => Some(&mut self.cosecha),
            DraftField::Lote | DraftField::Color => None,
        }
    }

    /// Recompute embolse and faltante from the current text
    pub fn derived_fields(&self) -> DerivedFields {
        let embolse = parse_count(&self.presente).saturating_add(parse_count(&self.novedades));
        let faltante = embolse.saturating_sub(parse_count(&self.cosecha));
        DerivedFields { embolse, faltante }
    }

    /// Snapshot the draft into a record without touching it
    pub fn to_record(&self, id: i64, week: i32, agricultor: &Identity) -> Record {
        let derived = self.derived_fields();
        Record {
            id,
            week,
            agricultor: agricultor.clone(),
            lote: self.lote,
            color: self.color,
            prematuro: self.prematuro.clone(),
            presente: self.presente.clone(),
            novedades: self.novedades.clone(),
            cosecha: self.cosecha.clone(),
            embolse: derived.embolse,
            faltante: derived.faltante,
        }
    }

    /// Empty the count fields, keeping lot and color for the next entry
    pub fn clear_counts(&mut self) {
        self.prematuro.clear();
        self.presente.clear();
        self.novedades.clear();
        self.cosecha.clear();
    }

    /// Finalize the draft into a record and reset the counts
    pub fn commit(&mut self, id: i64, week: i32, agricultor: &Identity) -> Record {
        let record = self.to_record(id, week, agricultor);
        self.clear_counts();
        record
    }
}
