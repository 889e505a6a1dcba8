//! Level consolidation and the global level registry.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{AtomError, Result};
use crate::priority::PriorityResolution;
use crate::schema::{levels, species};
use crate::source::SourceLevel;
use crate::species::{DataSource, Species};

/// A level after consolidation, before culling.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLevel {
    pub level_id: i64,
    pub species: Species,
    /// Index of the level in its source's own numbering.
    pub level_index: i64,
    pub g: i64,
    /// eV
    pub energy: f64,
    pub label: Option<String>,
    pub source: DataSource,
}

/// The consolidated levels and the `(species, level_index) -> level_id`
/// lookup of the retained source of each species.
///
/// Lines, collisions and cross sections can only be remapped through a
/// registry, so levels are always ingested first.
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    levels: Vec<CanonicalLevel>,
    lookup: HashMap<(Species, i64), i64>,
    by_id: HashMap<i64, usize>,
    resolution: PriorityResolution,
}

impl LevelRegistry {
    /// Merge NIST ground levels and the per-source levels (in declaration
    /// order) into one table with a single source per species.
    pub fn consolidate(
        ground_levels: &[SourceLevel],
        source_levels: &[SourceLevel],
        resolution: PriorityResolution,
    ) -> Result<Self> {
        info!("Ingesting energy levels.");

        let merged: Vec<CanonicalLevel> = ground_levels
            .iter()
            .chain(source_levels)
            .zip(1..)
            .map(|(level, level_id)| CanonicalLevel {
                level_id,
                species: level.species,
                level_index: level.level_index,
                g: level.g,
                energy: level.energy,
                label: level.label.clone(),
                source: level.source,
            })
            .collect();
        let total = merged.len();

        // Species with a winner keep only the winner's rows; the others keep
        // whatever they have, which is the NIST ground level.
        let retained: Vec<CanonicalLevel> = merged
            .into_iter()
            .filter(|level| match resolution.winner(level.species) {
                Some(winner) => level.source == winner,
                None => true,
            })
            .collect();

        // Among ground levels sharing (species, energy, g) the last inserted
        // survives; the dropped ones become aliases of it.
        let mut survivor: HashMap<(Species, i64), i64> = HashMap::new();
        let mut aliases: Vec<(Species, i64, i64)> = Vec::new();
        let mut kept = vec![true; retained.len()];
        for (pos, level) in retained.iter().enumerate().rev() {
            if level.energy != 0.0 {
                continue;
            }
            match survivor.get(&(level.species, level.g)) {
                Some(&level_id) => {
                    kept[pos] = false;
                    aliases.push((level.species, level.level_index, level_id));
                }
                None => {
                    survivor.insert((level.species, level.g), level.level_id);
                }
            }
        }
        let levels: Vec<CanonicalLevel> = retained
            .into_iter()
            .zip(kept)
            .filter_map(|(level, keep)| keep.then_some(level))
            .collect();

        let mut lookup = HashMap::with_capacity(levels.len());
        let mut by_id = HashMap::with_capacity(levels.len());
        for (pos, level) in levels.iter().enumerate() {
            by_id.insert(level.level_id, pos);
            if lookup
                .insert((level.species, level.level_index), level.level_id)
                .is_some()
            {
                warn!(
                    "{} declares level_index {} of {} twice; lines will use the last one.",
                    level.source, level.level_index, level.species
                );
            }
        }
        for (species, level_index, level_id) in aliases {
            debug!(
                "Duplicate ground level {} of {} merged into level_id {}.",
                level_index, species, level_id
            );
            lookup.entry((species, level_index)).or_insert(level_id);
        }

        info!("Kept {} of {} levels.", levels.len(), total);
        Ok(Self {
            levels,
            lookup,
            by_id,
            resolution,
        })
    }

    pub fn resolution(&self) -> &PriorityResolution {
        &self.resolution
    }

    pub fn levels(&self) -> &[CanonicalLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, level_id: i64) -> Option<&CanonicalLevel> {
        self.by_id.get(&level_id).map(|&pos| &self.levels[pos])
    }

    pub fn lookup(&self, species: Species, level_index: i64) -> Option<i64> {
        self.lookup.get(&(species, level_index)).copied()
    }

    /// Like [`lookup`](Self::lookup), but a missing level is an ordering
    /// violation on the caller's side.
    pub fn require(&self, species: Species, source: DataSource, level_index: i64) -> Result<i64> {
        self.lookup(species, level_index)
            .ok_or_else(|| AtomError::OrderingViolation {
                species,
                data_source: source.to_string(),
                level_index,
            })
    }

    /// Species with at least one level.
    pub fn species(&self) -> BTreeSet<Species> {
        self.levels.iter().map(|l| l.species).collect()
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let n = self.levels.len();
        let mut level_id = Vec::with_capacity(n);
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut g = Vec::with_capacity(n);
        let mut energy = Vec::with_capacity(n);
        let mut ds_id = Vec::with_capacity(n);
        for level in &self.levels {
            level_id.push(level.level_id);
            atomic_number.push(level.species.atomic_number);
            ion_number.push(level.species.ion_number);
            g.push(level.g);
            energy.push(level.energy);
            ds_id.push(level.source.ds_id());
        }
        Ok(DataFrame::new(vec![
            Column::new(levels::LEVEL_ID.into(), &level_id),
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(levels::G.into(), &g),
            Column::new(levels::ENERGY.into(), &energy),
            Column::new(levels::DS_ID.into(), &ds_id),
        ])?)
    }
}
