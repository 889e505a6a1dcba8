//! Per-source input tables and their typed row views.
//!
//! A reader (GFALL, CHIANTI, CMFGEN, LANL ADS ...) hands the pipeline one
//! [`SourceTables`] bundle. Layouts are checked against the known formats up
//! front; rows lacking a required field are dropped with a warning, except
//! where dropping them would misassign priorities.

use polars::prelude::*;
use tracing::warn;

use crate::error::{AtomError, Result};
use crate::frame::{
    column_names, f64_list_values, f64_values, has_column, i64_values, normalize_species_columns,
    require_columns, str_values,
};
use crate::schema::{collisions, cross_sections, levels, lines, species};
use crate::species::{DataSource, Species};

pub const DEFAULT_PRIORITY: i64 = 10;

/// Known layouts of a reader's levels table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelsLayout {
    /// Carries the statistical weight `g` directly.
    StatisticalWeight,
    /// Carries the total angular momentum `j`; `g = 2j + 1`.
    AngularMomentum,
}

impl LevelsLayout {
    const BASE: [&'static str; 4] = [
        species::ATOMIC_NUMBER,
        species::ION_NUMBER,
        levels::LEVEL_INDEX,
        levels::ENERGY,
    ];

    pub fn detect(df: &DataFrame) -> Result<Self> {
        let base = Self::BASE.iter().all(|c| has_column(df, c));
        match (base, has_column(df, levels::G), has_column(df, levels::J)) {
            (true, true, _) => Ok(Self::StatisticalWeight),
            (true, false, true) => Ok(Self::AngularMomentum),
            _ => Err(unrecognized("levels", df)),
        }
    }
}

/// Known layouts of a reader's lines table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinesLayout {
    Gf,
    LogGf,
}

impl LinesLayout {
    const BASE: [&'static str; 5] = [
        species::ATOMIC_NUMBER,
        species::ION_NUMBER,
        lines::LEVEL_INDEX_LOWER,
        lines::LEVEL_INDEX_UPPER,
        lines::WAVELENGTH,
    ];

    pub fn detect(df: &DataFrame) -> Result<Self> {
        let base = Self::BASE.iter().all(|c| has_column(df, c));
        match (base, has_column(df, lines::GF), has_column(df, lines::LOGGF)) {
            (true, true, _) => Ok(Self::Gf),
            (true, false, true) => Ok(Self::LogGf),
            _ => Err(unrecognized("lines", df)),
        }
    }
}

fn unrecognized(table: &str, df: &DataFrame) -> AtomError {
    AtomError::UnrecognizedFormat {
        table: table.to_string(),
        columns: df.width(),
        names: column_names(df),
    }
}

/// A level row as a reader declared it, in the reader's own indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLevel {
    pub species: Species,
    pub level_index: i64,
    pub g: i64,
    /// eV
    pub energy: f64,
    pub label: Option<String>,
    pub source: DataSource,
    pub priority: i64,
}

/// A line row in the reader's own level indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub species: Species,
    pub level_index_lower: i64,
    pub level_index_upper: i64,
    /// nm, in the source's medium convention
    pub wavelength: f64,
    pub gf: f64,
    pub source: DataSource,
}

/// Tabulated Burgess & Tully scaled collision strengths for one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    pub species: Species,
    pub level_index_lower: i64,
    pub level_index_upper: i64,
    pub ttype: i64,
    pub cups: f64,
    pub btemp: Vec<f64>,
    pub bscups: Vec<f64>,
    pub gf: Option<f64>,
    pub source: DataSource,
}

/// One point of a photoionization cross-section curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSectionPoint {
    pub species: Species,
    pub level_index: i64,
    /// Ry
    pub energy: f64,
    /// Mbarn
    pub sigma: f64,
    pub source: DataSource,
}

/// Everything one reader contributes to a run.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub source: DataSource,
    /// Priority of rows without their own `priority` value.
    pub priority: i64,
    pub levels: DataFrame,
    pub lines: DataFrame,
    pub collisions: Option<DataFrame>,
    pub cross_sections: Option<DataFrame>,
    pub version: Option<String>,
}

impl SourceTables {
    pub fn new(source: DataSource, levels: DataFrame, lines: DataFrame) -> Self {
        Self {
            source,
            priority: DEFAULT_PRIORITY,
            levels,
            lines,
            collisions: None,
            cross_sections: None,
            version: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_collisions(mut self, collisions: DataFrame) -> Self {
        self.collisions = Some(collisions);
        self
    }

    pub fn with_cross_sections(mut self, cross_sections: DataFrame) -> Self {
        self.cross_sections = Some(cross_sections);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Levels as typed rows, in table order.
    pub fn level_records(&self) -> Result<Vec<SourceLevel>> {
        let df = normalize_species_columns(self.levels.clone())?;
        let layout = LevelsLayout::detect(&df)?;
        self.check_ds_id(&df, "levels")?;

        let atomic_numbers = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ion_numbers = i64_values(&df, species::ION_NUMBER)?;
        let level_indices = i64_values(&df, levels::LEVEL_INDEX)?;
        let energies = f64_values(&df, levels::ENERGY)?;
        let weights: Vec<Option<i64>> = match layout {
            LevelsLayout::StatisticalWeight => i64_values(&df, levels::G)?,
            LevelsLayout::AngularMomentum => f64_values(&df, levels::J)?
                .into_iter()
                .map(|j| j.map(|j| (2.0 * j + 1.0).round() as i64))
                .collect(),
        };
        let labels = if has_column(&df, levels::LABEL) {
            str_values(&df, levels::LABEL)?
        } else {
            vec![None; df.height()]
        };
        let priorities = if has_column(&df, levels::PRIORITY) {
            Some(i64_values(&df, levels::PRIORITY)?)
        } else {
            None
        };

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(species) = self.species_at(&atomic_numbers, &ion_numbers, i, "levels")
            else {
                continue;
            };
            let priority = match &priorities {
                Some(values) => values[i].ok_or_else(|| AtomError::MissingPriority {
                    data_source: self.source.to_string(),
                    species,
                })?,
                None => self.priority,
            };
            let Some(level_index) = level_indices[i] else {
                self.drop_row("levels", i, Some(species), levels::LEVEL_INDEX);
                continue;
            };
            let Some(energy) = energies[i].filter(|e| e.is_finite()) else {
                self.drop_row("levels", i, Some(species), levels::ENERGY);
                continue;
            };
            let Some(g) = weights[i].filter(|g| *g > 0) else {
                self.drop_row("levels", i, Some(species), levels::G);
                continue;
            };
            records.push(SourceLevel {
                species,
                level_index,
                g,
                energy: energy.abs(),
                label: labels[i].clone(),
                source: self.source,
                priority,
            });
        }
        Ok(records)
    }

    /// Lines as typed rows, in table order. Lines with `gf <= 0` are dropped.
    pub fn line_records(&self) -> Result<Vec<SourceLine>> {
        let df = normalize_species_columns(self.lines.clone())?;
        let layout = LinesLayout::detect(&df)?;
        self.check_ds_id(&df, "lines")?;

        let atomic_numbers = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ion_numbers = i64_values(&df, species::ION_NUMBER)?;
        let lower = i64_values(&df, lines::LEVEL_INDEX_LOWER)?;
        let upper = i64_values(&df, lines::LEVEL_INDEX_UPPER)?;
        let wavelengths = f64_values(&df, lines::WAVELENGTH)?;
        let gfs: Vec<Option<f64>> = match layout {
            LinesLayout::Gf => f64_values(&df, lines::GF)?,
            LinesLayout::LogGf => f64_values(&df, lines::LOGGF)?
                .into_iter()
                .map(|v| v.map(|loggf| 10f64.powf(loggf)))
                .collect(),
        };

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(species) = self.species_at(&atomic_numbers, &ion_numbers, i, "lines") else {
                continue;
            };
            let (Some(level_index_lower), Some(level_index_upper)) = (lower[i], upper[i]) else {
                self.drop_row("lines", i, Some(species), "level_index");
                continue;
            };
            let Some(wavelength) = wavelengths[i].filter(|w| w.is_finite() && *w > 0.0) else {
                self.drop_row("lines", i, Some(species), lines::WAVELENGTH);
                continue;
            };
            let Some(gf) = gfs[i].filter(|gf| gf.is_finite() && *gf > 0.0) else {
                self.drop_row("lines", i, Some(species), lines::GF);
                continue;
            };
            records.push(SourceLine {
                species,
                level_index_lower,
                level_index_upper,
                wavelength,
                gf,
                source: self.source,
            });
        }
        Ok(records)
    }

    pub fn collision_records(&self) -> Result<Vec<CollisionRecord>> {
        let Some(df) = &self.collisions else {
            return Ok(Vec::new());
        };
        let df = normalize_species_columns(df.clone())?;
        require_columns(
            &df,
            &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                lines::LEVEL_INDEX_LOWER,
                lines::LEVEL_INDEX_UPPER,
                collisions::TTYPE,
                collisions::CUPS,
                collisions::BTEMP,
                collisions::BSCUPS,
            ],
        )?;

        let atomic_numbers = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ion_numbers = i64_values(&df, species::ION_NUMBER)?;
        let lower = i64_values(&df, lines::LEVEL_INDEX_LOWER)?;
        let upper = i64_values(&df, lines::LEVEL_INDEX_UPPER)?;
        let ttypes = i64_values(&df, collisions::TTYPE)?;
        let cups = f64_values(&df, collisions::CUPS)?;
        let btemps = f64_list_values(&df, collisions::BTEMP)?;
        let bscups = f64_list_values(&df, collisions::BSCUPS)?;
        let gfs = if has_column(&df, lines::GF) {
            f64_values(&df, lines::GF)?
        } else {
            vec![None; df.height()]
        };

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(species) = self.species_at(&atomic_numbers, &ion_numbers, i, "collisions")
            else {
                continue;
            };
            let (Some(level_index_lower), Some(level_index_upper)) = (lower[i], upper[i]) else {
                self.drop_row("collisions", i, Some(species), "level_index");
                continue;
            };
            let Some(ttype) = ttypes[i] else {
                self.drop_row("collisions", i, Some(species), collisions::TTYPE);
                continue;
            };
            let Some(c) = cups[i] else {
                self.drop_row("collisions", i, Some(species), collisions::CUPS);
                continue;
            };
            let (Some(btemp), Some(bscups)) = (btemps[i].clone(), bscups[i].clone()) else {
                self.drop_row("collisions", i, Some(species), collisions::BSCUPS);
                continue;
            };
            if btemp.len() != bscups.len() {
                warn!(
                    "Dropping {} collisions row {} for {}: {} temperatures but {} strengths.",
                    self.source,
                    i,
                    species,
                    btemp.len(),
                    bscups.len()
                );
                continue;
            }
            records.push(CollisionRecord {
                species,
                level_index_lower,
                level_index_upper,
                ttype,
                cups: c,
                btemp,
                bscups,
                gf: gfs[i],
                source: self.source,
            });
        }
        Ok(records)
    }

    pub fn cross_section_records(&self) -> Result<Vec<CrossSectionPoint>> {
        let Some(df) = &self.cross_sections else {
            return Ok(Vec::new());
        };
        let df = normalize_species_columns(df.clone())?;
        require_columns(
            &df,
            &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                levels::LEVEL_INDEX,
                cross_sections::ENERGY,
                cross_sections::SIGMA,
            ],
        )?;

        let atomic_numbers = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ion_numbers = i64_values(&df, species::ION_NUMBER)?;
        let level_indices = i64_values(&df, levels::LEVEL_INDEX)?;
        let energies = f64_values(&df, cross_sections::ENERGY)?;
        let sigmas = f64_values(&df, cross_sections::SIGMA)?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(species) =
                self.species_at(&atomic_numbers, &ion_numbers, i, "cross_sections")
            else {
                continue;
            };
            let (Some(level_index), Some(energy), Some(sigma)) =
                (level_indices[i], energies[i], sigmas[i])
            else {
                self.drop_row("cross_sections", i, Some(species), "level_index/energy/sigma");
                continue;
            };
            records.push(CrossSectionPoint {
                species,
                level_index,
                energy,
                sigma,
                source: self.source,
            });
        }
        Ok(records)
    }

    fn species_at(
        &self,
        atomic_numbers: &[Option<i64>],
        ion_numbers: &[Option<i64>],
        row: usize,
        table: &str,
    ) -> Option<Species> {
        let (Some(z), Some(ion)) = (atomic_numbers[row], ion_numbers[row]) else {
            self.drop_row(table, row, None, "atomic_number/ion_number");
            return None;
        };
        let species = Species::new(z, ion);
        if !species.is_valid() {
            warn!(
                "Dropping {} {} row {}: invalid species (atomic_number={}, ion_number={}).",
                self.source, table, row, z, ion
            );
            return None;
        }
        Some(species)
    }

    fn drop_row(&self, table: &str, row: usize, species: Option<Species>, field: &str) {
        match species {
            Some(species) => warn!(
                "Dropping {} {} row {} for {}: missing or invalid `{}`.",
                self.source, table, row, species, field
            ),
            None => warn!(
                "Dropping {} {} row {}: missing or invalid `{}`.",
                self.source, table, row, field
            ),
        }
    }

    /// A `ds_id` column, when present, must be complete and agree with the
    /// declared source.
    fn check_ds_id(&self, df: &DataFrame, table: &str) -> Result<()> {
        if !has_column(df, levels::DS_ID) {
            return Ok(());
        }
        for (row, ds_id) in i64_values(df, levels::DS_ID)?.into_iter().enumerate() {
            match ds_id {
                None => {
                    return Err(AtomError::InvalidData(format!(
                        "{} {} row {} has no ds_id",
                        self.source, table, row
                    )))
                }
                Some(id) if id != self.source.ds_id() => {
                    return Err(AtomError::InvalidData(format!(
                        "{} {} row {} has ds_id {} but the source is {}",
                        self.source,
                        table,
                        row,
                        id,
                        self.source.ds_id()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels_with_j() -> DataFrame {
        DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 14, 14]),
            Column::new("ion_charge".into(), &[1i64, 1, 1]),
            Column::new("level_index".into(), &[0i64, 1, 2]),
            Column::new("energy".into(), &[Some(0.0f64), Some(-0.0356), None]),
            Column::new("j".into(), &[0.5f64, 1.5, 2.5]),
        ])
        .unwrap()
    }

    fn lines_with_loggf() -> DataFrame {
        DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 14]),
            Column::new("ion_number".into(), &[1i64, 1]),
            Column::new("level_index_lower".into(), &[0i64, 0]),
            Column::new("level_index_upper".into(), &[1i64, 1]),
            Column::new("wavelength".into(), &[634.7f64, 637.1]),
            Column::new("loggf".into(), &[0.3f64, -0.1]),
        ])
        .unwrap()
    }

    #[test]
    fn angular_momentum_layout_gives_weights() {
        let tables = SourceTables::new(DataSource::Gfall, levels_with_j(), lines_with_loggf());
        let records = tables.level_records().unwrap();
        // third row has no energy and is dropped
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].g, 2);
        assert_eq!(records[1].g, 4);
        assert_eq!(records[1].energy, 0.0356);
        assert_eq!(records[0].priority, DEFAULT_PRIORITY);
        assert_eq!(records[0].species, Species::new(14, 1));
    }

    #[test]
    fn loggf_layout_gives_gf() {
        let tables = SourceTables::new(DataSource::Gfall, levels_with_j(), lines_with_loggf());
        let records = tables.line_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].gf - 10f64.powf(0.3)).abs() < 1e-12);
    }

    #[test]
    fn unknown_layout_reports_column_count() {
        let df = DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64]),
            Column::new("ion_number".into(), &[1i64]),
            Column::new("energy".into(), &[0.0f64]),
        ])
        .unwrap();
        match LevelsLayout::detect(&df) {
            Err(AtomError::UnrecognizedFormat { table, columns, .. }) => {
                assert_eq!(table, "levels");
                assert_eq!(columns, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_priority_is_fatal() {
        let mut df = levels_with_j();
        df.with_column(Column::new("priority".into(), &[Some(10i64), None, Some(10)]))
            .unwrap();
        let tables = SourceTables::new(DataSource::Chianti, df, lines_with_loggf());
        assert!(matches!(
            tables.level_records(),
            Err(AtomError::MissingPriority { .. })
        ));
    }

    #[test]
    fn mismatched_ds_id_is_fatal() {
        let mut df = levels_with_j();
        df.with_column(Column::new("ds_id".into(), &[4i64, 4, 4])).unwrap();
        let tables = SourceTables::new(DataSource::Gfall, df, lines_with_loggf());
        assert!(matches!(tables.level_records(), Err(AtomError::InvalidData(_))));
    }

    #[test]
    fn non_positive_gf_is_dropped() {
        let df = DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 14]),
            Column::new("ion_number".into(), &[1i64, 1]),
            Column::new("level_index_lower".into(), &[0i64, 0]),
            Column::new("level_index_upper".into(), &[1i64, 1]),
            Column::new("wavelength".into(), &[634.7f64, 637.1]),
            Column::new("gf".into(), &[0.0f64, 1.2]),
        ])
        .unwrap();
        let tables = SourceTables::new(DataSource::Chianti, levels_with_j(), df);
        let records = tables.line_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gf, 1.2);
    }
}
