//! Line consolidation: priority filtering, level remapping and vacuum
//! wavelengths.

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Result;
use crate::levels::LevelRegistry;
use crate::schema::{lines, species};
use crate::source::SourceLine;
use crate::species::{DataSource, Medium, Species};
use crate::units::{air_to_vacuum, nm_to_angstrom, AIR_THRESHOLD_ANGSTROM};

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLine {
    pub line_id: i64,
    pub species: Species,
    pub lower_level_id: i64,
    pub upper_level_id: i64,
    /// Å, vacuum
    pub wavelength: f64,
    pub gf: f64,
    pub loggf: f64,
    pub source: DataSource,
}

/// Vacuum wavelength [Å] of a line quoted in nm by `source`.
pub fn vacuum_wavelength(wavelength_nm: f64, source: DataSource) -> f64 {
    let wavelength = nm_to_angstrom(wavelength_nm);
    match source.medium_above_air_threshold() {
        Medium::Air if wavelength > AIR_THRESHOLD_ANGSTROM => air_to_vacuum(wavelength),
        _ => wavelength,
    }
}

pub struct LineConsolidator<'a> {
    registry: &'a LevelRegistry,
}

impl<'a> LineConsolidator<'a> {
    pub fn new(registry: &'a LevelRegistry) -> Self {
        Self { registry }
    }

    /// Consolidate the lines of all sources, given in declaration order.
    ///
    /// Lines of a source for species it did not win are dropped; the rest
    /// are numbered `1..=N` in input order.
    pub fn consolidate(&self, source_lines: &[SourceLine]) -> Result<Vec<CanonicalLine>> {
        info!("Ingesting transition lines.");
        let resolution = self.registry.resolution();

        let mut consolidated = Vec::with_capacity(source_lines.len());
        let mut dropped = 0usize;
        for line in source_lines {
            if !resolution.wins(line.source, line.species) {
                dropped += 1;
                continue;
            }
            let lower_level_id =
                self.registry
                    .require(line.species, line.source, line.level_index_lower)?;
            let upper_level_id =
                self.registry
                    .require(line.species, line.source, line.level_index_upper)?;
            consolidated.push(CanonicalLine {
                line_id: consolidated.len() as i64 + 1,
                species: line.species,
                lower_level_id,
                upper_level_id,
                wavelength: vacuum_wavelength(line.wavelength, line.source),
                gf: line.gf,
                loggf: line.gf.log10(),
                source: line.source,
            });
        }
        debug!("Dropped {} lines of species won by another source.", dropped);
        info!("Matched {} lines to levels.", consolidated.len());
        Ok(consolidated)
    }
}

pub fn lines_frame(consolidated: &[CanonicalLine]) -> Result<DataFrame> {
    let n = consolidated.len();
    let mut line_id = Vec::with_capacity(n);
    let mut atomic_number = Vec::with_capacity(n);
    let mut ion_number = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);
    let mut upper = Vec::with_capacity(n);
    let mut wavelength = Vec::with_capacity(n);
    let mut gf = Vec::with_capacity(n);
    let mut loggf = Vec::with_capacity(n);
    for line in consolidated {
        line_id.push(line.line_id);
        atomic_number.push(line.species.atomic_number);
        ion_number.push(line.species.ion_number);
        lower.push(line.lower_level_id);
        upper.push(line.upper_level_id);
        wavelength.push(line.wavelength);
        gf.push(line.gf);
        loggf.push(line.loggf);
    }
    Ok(DataFrame::new(vec![
        Column::new(lines::LINE_ID.into(), &line_id),
        Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
        Column::new(species::ION_NUMBER.into(), &ion_number),
        Column::new(lines::LOWER_LEVEL_ID.into(), &lower),
        Column::new(lines::UPPER_LEVEL_ID.into(), &upper),
        Column::new(lines::WAVELENGTH.into(), &wavelength),
        Column::new(lines::GF.into(), &gf),
        Column::new(lines::LOGGF.into(), &loggf),
    ])?)
}
