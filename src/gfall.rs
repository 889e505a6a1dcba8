//! Level and line extraction from parsed Kurucz GFALL rows.
//!
//! The fixed-width parsing of `gfall.dat` is the reader's job; this module
//! starts from one row per line with both levels side by side (`*_first`,
//! `*_second`, energies in cm^-1, negative for predicted levels) and builds
//! the levels/lines tables in GFALL's own level indexing.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::{f64_values, require_columns, str_values};
use crate::schema::{gfall, levels, lines, species};
use crate::source::{SourceTables, DEFAULT_PRIORITY};
use crate::species::{DataSource, Species};
use crate::units::inverse_cm_to_ev;

/// Pseudo-levels that GFALL lists with these labels are not real states.
const IGNORED_LABELS: [&str; 3] = ["AVERAGE", "ENERGIES", "CONTINUUM"];

/// Attribute used, together with the species, to decide that two level
/// occurrences are the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelIdentifier {
    Energy,
    J,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Bits(u64),
    Text(String),
}

#[derive(Debug, Clone)]
struct GfallLevel {
    energy: f64,
    j: f64,
    label: String,
    predicted: bool,
}

#[derive(Debug, Clone)]
struct GfallRow {
    species: Species,
    wavelength: f64,
    loggf: f64,
    lower: GfallLevel,
    upper: GfallLevel,
}

#[derive(Debug, Clone)]
pub struct GfallIngester {
    pub ions: Option<BTreeSet<Species>>,
    pub unique_level_identifier: Vec<LevelIdentifier>,
    pub priority: i64,
}

impl Default for GfallIngester {
    fn default() -> Self {
        Self {
            ions: None,
            unique_level_identifier: vec![LevelIdentifier::Energy, LevelIdentifier::J],
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl GfallIngester {
    pub fn with_ions(mut self, ions: impl IntoIterator<Item = Species>) -> Self {
        self.ions = Some(ions.into_iter().collect());
        self
    }

    pub fn with_unique_level_identifier(mut self, identifier: Vec<LevelIdentifier>) -> Self {
        self.unique_level_identifier = identifier;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Build the GFALL source tables from parsed rows.
    pub fn ingest(&self, raw: &DataFrame) -> Result<SourceTables> {
        let rows = self.parse(raw)?;
        let (levels_df, index) = self.extract_levels(&rows)?;
        let lines_df = self.extract_lines(&rows, &index)?;
        Ok(SourceTables::new(DataSource::Gfall, levels_df, lines_df).with_priority(self.priority))
    }

    fn parse(&self, raw: &DataFrame) -> Result<Vec<GfallRow>> {
        require_columns(
            raw,
            &[
                gfall::WAVELENGTH,
                gfall::LOGGF,
                gfall::ELEMENT_CODE,
                gfall::E_FIRST,
                gfall::J_FIRST,
                gfall::LABEL_FIRST,
                gfall::E_SECOND,
                gfall::J_SECOND,
                gfall::LABEL_SECOND,
            ],
        )?;
        let wavelength = f64_values(raw, gfall::WAVELENGTH)?;
        let loggf = f64_values(raw, gfall::LOGGF)?;
        let element_code = f64_values(raw, gfall::ELEMENT_CODE)?;
        let e_first = f64_values(raw, gfall::E_FIRST)?;
        let j_first = f64_values(raw, gfall::J_FIRST)?;
        let label_first = str_values(raw, gfall::LABEL_FIRST)?;
        let e_second = f64_values(raw, gfall::E_SECOND)?;
        let j_second = f64_values(raw, gfall::J_SECOND)?;
        let label_second = str_values(raw, gfall::LABEL_SECOND)?;

        info!("Parsing {} GFALL rows.", raw.height());

        let mut rows = Vec::with_capacity(raw.height());
        for i in 0..raw.height() {
            let (Some(wl), Some(lgf), Some(code), Some(e1), Some(j1), Some(e2), Some(j2)) = (
                wavelength[i],
                loggf[i],
                element_code[i],
                e_first[i],
                j_first[i],
                e_second[i],
                j_second[i],
            ) else {
                warn!("Dropping GFALL row {}: missing numeric field.", i);
                continue;
            };

            let atomic_number = code.trunc() as i64;
            let ion_number = ((code - code.trunc()) * 100.0).round() as i64;
            let species = Species::new(atomic_number, ion_number);
            if !species.is_valid() {
                warn!("Dropping GFALL row {}: invalid element code {}.", i, code);
                continue;
            }

            let first = GfallLevel {
                energy: e1.abs(),
                j: j1,
                label: clean_label(label_first[i].as_deref()),
                predicted: e1 < 0.0,
            };
            let second = GfallLevel {
                energy: e2.abs(),
                j: j2,
                label: clean_label(label_second[i].as_deref()),
                predicted: e2 < 0.0,
            };
            let (lower, upper) = if first.energy < second.energy {
                (first, second)
            } else {
                (second, first)
            };

            if IGNORED_LABELS.contains(&lower.label.as_str())
                || IGNORED_LABELS.contains(&upper.label.as_str())
            {
                continue;
            }
            if let Some(ions) = &self.ions {
                if !ions.contains(&species) {
                    continue;
                }
            }

            rows.push(GfallRow {
                species,
                wavelength: wl,
                loggf: lgf,
                lower,
                upper,
            });
        }
        Ok(rows)
    }

    fn level_key(&self, species: Species, level: &GfallLevel) -> (Species, Vec<KeyPart>) {
        let parts = self
            .unique_level_identifier
            .iter()
            .map(|id| match id {
                LevelIdentifier::Energy => KeyPart::Bits(level.energy.to_bits()),
                LevelIdentifier::J => KeyPart::Bits(level.j.to_bits()),
                LevelIdentifier::Label => KeyPart::Text(level.label.clone()),
            })
            .collect();
        (species, parts)
    }

    /// Union of lower and upper levels, deduplicated on the unique level
    /// identifier and numbered per species by (energy, j, label).
    fn extract_levels(
        &self,
        rows: &[GfallRow],
    ) -> Result<(DataFrame, HashMap<(Species, Vec<KeyPart>), i64>)> {
        let mut seen = HashMap::new();
        let mut unique: Vec<(Species, GfallLevel)> = Vec::new();
        let candidates = rows
            .iter()
            .map(|r| (r.species, &r.lower))
            .chain(rows.iter().map(|r| (r.species, &r.upper)));
        for (species, level) in candidates {
            let key = self.level_key(species, level);
            if seen.insert(key, ()).is_none() {
                unique.push((species, level.clone()));
            }
        }

        unique.sort_by(|(sa, a), (sb, b)| {
            sa.cmp(sb)
                .then(a.energy.total_cmp(&b.energy))
                .then(a.j.total_cmp(&b.j))
                .then(a.label.cmp(&b.label))
        });

        let n = unique.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut level_index = Vec::with_capacity(n);
        let mut energy = Vec::with_capacity(n);
        let mut j = Vec::with_capacity(n);
        let mut label = Vec::with_capacity(n);
        let mut method = Vec::with_capacity(n);
        let mut priority = Vec::with_capacity(n);
        let mut index = HashMap::with_capacity(n);

        let mut current: Option<Species> = None;
        let mut next_index = 0i64;
        for (species, level) in &unique {
            if current != Some(*species) {
                current = Some(*species);
                next_index = 0;
            }
            index.insert(self.level_key(*species, level), next_index);
            atomic_number.push(species.atomic_number);
            ion_number.push(species.ion_number);
            level_index.push(next_index);
            energy.push(inverse_cm_to_ev(level.energy));
            j.push(level.j);
            label.push(level.label.clone());
            method.push(if level.predicted { "theor" } else { "meas" });
            priority.push(self.priority);
            next_index += 1;
        }

        let df = DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(levels::LEVEL_INDEX.into(), &level_index),
            Column::new(levels::ENERGY.into(), &energy),
            Column::new(levels::J.into(), &j),
            Column::new(levels::LABEL.into(), &label),
            Column::new(levels::METHOD.into(), &method),
            Column::new(levels::PRIORITY.into(), &priority),
        ])?;
        Ok((df, index))
    }

    fn extract_lines(
        &self,
        rows: &[GfallRow],
        index: &HashMap<(Species, Vec<KeyPart>), i64>,
    ) -> Result<DataFrame> {
        let n = rows.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut wavelength = Vec::with_capacity(n);
        let mut gf = Vec::with_capacity(n);

        for row in rows {
            // every level of every kept row went through extract_levels
            let (Some(&lo), Some(&up)) = (
                index.get(&self.level_key(row.species, &row.lower)),
                index.get(&self.level_key(row.species, &row.upper)),
            ) else {
                continue;
            };
            atomic_number.push(row.species.atomic_number);
            ion_number.push(row.species.ion_number);
            lower.push(lo);
            upper.push(up);
            wavelength.push(row.wavelength);
            gf.push(10f64.powf(row.loggf));
        }

        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(lines::LEVEL_INDEX_LOWER.into(), &lower),
            Column::new(lines::LEVEL_INDEX_UPPER.into(), &upper),
            Column::new(lines::WAVELENGTH.into(), &wavelength),
            Column::new(lines::GF.into(), &gf),
        ])?)
    }
}

fn clean_label(label: Option<&str>) -> String {
    label
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::i64_values;
    use approx::assert_relative_eq;

    fn raw_rows() -> DataFrame {
        DataFrame::new(vec![
            Column::new("wavelength".into(), &[634.7100f64, 637.1371, 385.6018, 100.0]),
            Column::new("loggf".into(), &[0.297f64, -0.003, -0.557, 0.0]),
            Column::new("element_code".into(), &[14.01f64, 14.01, 14.01, 14.01]),
            Column::new("e_first".into(), &[65500.47f64, 287.24, 0.0, 0.0]),
            Column::new("j_first".into(), &[2.5f64, 1.5, 0.5, 0.5]),
            Column::new(
                "label_first".into(),
                &["3s2.4p   2P", "3s2.3p  2P", "3s2.3p 2P", "3s2.3p 2P"],
            ),
            Column::new("e_second".into(), &[81191.34f64, 81191.34, -25931.0, 90000.0]),
            Column::new("j_second".into(), &[1.5f64, 0.5, 1.5, 0.5]),
            Column::new(
                "label_second".into(),
                &["3s2.4d 2D", "3s2.4s 2S", "3s.3p2 2D", "CONTINUUM"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn orients_and_indexes_levels() {
        let tables = GfallIngester::default().ingest(&raw_rows()).unwrap();
        let levels_df = &tables.levels;
        // 0.0 and 287.24 and 25931 and 65500.47 and two at 81191.34 with different j
        assert_eq!(levels_df.height(), 6);
        let idx = i64_values(levels_df, "level_index").unwrap();
        assert_eq!(idx, (0..6).map(Some).collect::<Vec<_>>());
        let energies = f64_values(levels_df, "energy").unwrap();
        assert_eq!(energies[0], Some(0.0));
        assert_relative_eq!(energies[1].unwrap(), inverse_cm_to_ev(287.24));
        let methods = str_values(levels_df, "method").unwrap();
        assert_eq!(methods[2].as_deref(), Some("theor"));
        assert_eq!(methods[1].as_deref(), Some("meas"));
    }

    #[test]
    fn continuum_rows_are_ignored() {
        let tables = GfallIngester::default().ingest(&raw_rows()).unwrap();
        assert_eq!(tables.lines.height(), 3);
        let wavelengths = f64_values(&tables.lines, "wavelength").unwrap();
        assert!(!wavelengths.contains(&Some(100.0)));
    }

    #[test]
    fn lines_point_at_oriented_levels() {
        let tables = GfallIngester::default().ingest(&raw_rows()).unwrap();
        let lower = i64_values(&tables.lines, "level_index_lower").unwrap();
        let upper = i64_values(&tables.lines, "level_index_upper").unwrap();
        // 385.6 nm row was given upper-first: 0.0 (j=0.5) -> 25931 (j=1.5)
        assert_eq!(lower[2], Some(0));
        assert_eq!(upper[2], Some(2));
        for (lo, up) in lower.iter().zip(&upper) {
            assert!(lo < up);
        }
    }

    #[test]
    fn ion_selection_filters_rows() {
        let tables = GfallIngester::default()
            .with_ions([Species::new(26, 1)])
            .ingest(&raw_rows())
            .unwrap();
        assert_eq!(tables.levels.height(), 0);
        assert_eq!(tables.lines.height(), 0);
    }

    #[test]
    fn label_whitespace_is_collapsed() {
        assert_eq!(clean_label(Some("  3s2.4p   2P ")), "3s2.4p 2P");
        assert_eq!(clean_label(None), "");
    }
}
