use std::fmt;

use serde::{Deserialize, Serialize};

const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Element symbol for an atomic number, `None` outside 1..=118.
pub fn element_symbol(atomic_number: i64) -> Option<&'static str> {
    usize::try_from(atomic_number)
        .ok()
        .and_then(|z| z.checked_sub(1))
        .and_then(|i| ELEMENT_SYMBOLS.get(i).copied())
}

/// An ionization stage: `(atomic_number, ion_number)`.
///
/// Ordered by atomic number, then ion number, which is the sort order of
/// every prepared table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Species {
    pub atomic_number: i64,
    pub ion_number: i64,
}

impl Species {
    pub fn new(atomic_number: i64, ion_number: i64) -> Self {
        Self {
            atomic_number,
            ion_number,
        }
    }

    /// `atomic_number >= 1` and `0 <= ion_number <= atomic_number`.
    pub fn is_valid(&self) -> bool {
        self.atomic_number >= 1 && (0..=self.atomic_number).contains(&self.ion_number)
    }

    /// The bare nucleus of this element.
    pub fn fully_ionized(atomic_number: i64) -> Self {
        Self::new(atomic_number, atomic_number)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match element_symbol(self.atomic_number) {
            Some(symbol) => write!(f, "{} {}", symbol, self.ion_number),
            None => write!(f, "Z={} {}", self.atomic_number, self.ion_number),
        }
    }
}

/// Join a set of species as `"Si 1, Si 2"` for log messages.
pub fn species_list<'a>(species: impl IntoIterator<Item = &'a Species>) -> String {
    species
        .into_iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Medium in which a source quotes its wavelengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Vacuum,
    Air,
}

/// Data source identifiers (`ds_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Nist,
    Gfall,
    Zeta,
    Chianti,
    Cmfgen,
    LanlAds,
}

impl DataSource {
    pub const ALL: [DataSource; 6] = [
        DataSource::Nist,
        DataSource::Gfall,
        DataSource::Zeta,
        DataSource::Chianti,
        DataSource::Cmfgen,
        DataSource::LanlAds,
    ];

    pub fn ds_id(self) -> i64 {
        match self {
            DataSource::Nist => 1,
            DataSource::Gfall => 2,
            DataSource::Zeta => 3,
            DataSource::Chianti => 4,
            DataSource::Cmfgen => 5,
            DataSource::LanlAds => 6,
        }
    }

    pub fn from_ds_id(ds_id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.ds_id() == ds_id)
    }

    /// Case-insensitive lookup by display name (`"GFALL"`, `"lanl ads"`) or
    /// config spelling (`"lanl_ads"`).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().replace('_', " ");
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(&wanted))
    }

    pub fn name(self) -> &'static str {
        match self {
            DataSource::Nist => "NIST",
            DataSource::Gfall => "GFALL",
            DataSource::Zeta => "Zeta",
            DataSource::Chianti => "Chianti",
            DataSource::Cmfgen => "CMFGEN",
            DataSource::LanlAds => "LANL ADS",
        }
    }

    /// Medium of wavelengths above the air threshold (2000 Å).
    /// Below the threshold every source quotes vacuum wavelengths.
    pub fn medium_above_air_threshold(self) -> Medium {
        match self {
            DataSource::Nist | DataSource::Gfall => Medium::Air,
            _ => Medium::Vacuum,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_symbol_and_ion_number() {
        assert_eq!(Species::new(14, 1).to_string(), "Si 1");
        assert_eq!(Species::new(1, 0).to_string(), "H 0");
        assert_eq!(Species::new(200, 3).to_string(), "Z=200 3");
    }

    #[test]
    fn validity_bounds() {
        assert!(Species::new(26, 26).is_valid());
        assert!(!Species::new(26, 27).is_valid());
        assert!(!Species::new(0, 0).is_valid());
        assert!(!Species::new(8, -1).is_valid());
    }

    #[test]
    fn ds_id_round_trips() {
        for source in DataSource::ALL {
            assert_eq!(DataSource::from_ds_id(source.ds_id()), Some(source));
        }
        assert_eq!(DataSource::from_ds_id(42), None);
    }

    #[test]
    fn source_names_parse_loosely() {
        assert_eq!(DataSource::from_name("gfall"), Some(DataSource::Gfall));
        assert_eq!(DataSource::from_name("LANL_ADS"), Some(DataSource::LanlAds));
        assert_eq!(DataSource::from_name(" Chianti "), Some(DataSource::Chianti));
        assert_eq!(DataSource::from_name("kurucz"), None);
    }
}
