//! Lot and tape-color selections

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Banana lot a count belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Lote {
    #[default]
    #[serde(rename = "Lote 1")]
    Lote1,
    #[serde(rename = "Lote 2")]
    Lote2,
    #[serde(rename = "Lote 3")]
    Lote3,
    #[serde(rename = "Lote 4")]
    Lote4,
}

impl Lote {
    pub const ALL: [Lote; 4] = [Lote::Lote1, Lote::Lote2, Lote::Lote3, Lote::Lote4];

    pub fn label(&self) -> &'static str {
        match self {
            Lote::Lote1 => "Lote 1",
            Lote::Lote2 => "Lote 2",
            Lote::Lote3 => "Lote 3",
            Lote::Lote4 => "Lote 4",
        }
    }
}

impl std::fmt::Display for Lote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Lote {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lote::ALL
            .into_iter()
            .find(|lote| lote.label() == s)
            .ok_or_else(|| ValidationError::UnknownLote(s.to_string()))
    }
}

/// Weekly tape color tied around a bagged bunch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TapeColor {
    #[default]
    Blanco,
    Azul,
    Dorado,
    Gris,
    Morado,
    #[serde(rename = "Café con Negro")]
    CafeConNegro,
    Naranja,
    Verde,
    Amarillo,
}

impl TapeColor {
    /// Picker order
    pub const ALL: [TapeColor; 9] = [
        TapeColor::Blanco,
        TapeColor::Azul,
        TapeColor::Dorado,
        TapeColor::Gris,
        TapeColor::Morado,
        TapeColor::CafeConNegro,
        TapeColor::Naranja,
        TapeColor::Verde,
        TapeColor::Amarillo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TapeColor::Blanco => "Blanco",
            TapeColor::Azul => "Azul",
            TapeColor::Dorado => "Dorado",
            TapeColor::Gris => "Gris",
            TapeColor::Morado => "Morado",
            TapeColor::CafeConNegro => "Café con Negro",
            TapeColor::Naranja => "Naranja",
            TapeColor::Verde => "Verde",
            TapeColor::Amarillo => "Amarillo",
        }
    }
}

impl std::fmt::Display for TapeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TapeColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TapeColor::ALL
            .into_iter()
            .find(|color| color.label() == s)
            .ok_or_else(|| ValidationError::UnknownTapeColor(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Lote::default(), Lote::Lote1);
        assert_eq!(TapeColor::default(), TapeColor::Blanco);
    }

    #[test]
    fn test_labels_parse_back() {
        for lote in Lote::ALL {
            assert_eq!(lote.label().parse::<Lote>().unwrap(), lote);
        }
        for color in TapeColor::ALL {
            assert_eq!(color.label().parse::<TapeColor>().unwrap(), color);
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Lote::Lote3).unwrap(), "\"Lote 3\"");
        assert_eq!(
            serde_json::to_string(&TapeColor::CafeConNegro).unwrap(),
            "\"Café con Negro\""
        );
        let color: TapeColor = serde_json::from_str("\"Naranja\"").unwrap();
        assert_eq!(color, TapeColor::Naranja);
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!("Lote 5".parse::<Lote>().is_err());
        assert!("lote 1".parse::<Lote>().is_err());
        assert!("Rojo".parse::<TapeColor>().is_err());
    }
}
