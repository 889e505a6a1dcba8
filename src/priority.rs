//! Per-species source selection.
//!
//! Every species keeps the levels (and hence lines, collisions and cross
//! sections) of exactly one source: the one declaring the highest priority.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::TieBreak;
use crate::error::{AtomError, Result};
use crate::source::SourceLevel;
use crate::species::{species_list, DataSource, Species};

/// The winning source of each species.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityResolution {
    winners: BTreeMap<Species, DataSource>,
}

impl PriorityResolution {
    pub fn winner(&self, species: Species) -> Option<DataSource> {
        self.winners.get(&species).copied()
    }

    pub fn wins(&self, source: DataSource, species: Species) -> bool {
        self.winner(species) == Some(source)
    }

    /// Species won by `source`.
    pub fn won_by(&self, source: DataSource) -> BTreeSet<Species> {
        self.winners
            .iter()
            .filter(|(_, s)| **s == source)
            .map(|(species, _)| *species)
            .collect()
    }

    /// Species won by each source. The sets are disjoint, since every species
    /// has exactly one winner.
    pub fn win_sets(&self) -> BTreeMap<DataSource, BTreeSet<Species>> {
        let mut sets: BTreeMap<DataSource, BTreeSet<Species>> = BTreeMap::new();
        for (species, source) in &self.winners {
            sets.entry(*source).or_default().insert(*species);
        }
        sets
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

/// Pick the winning source of every species among non-NIST levels.
///
/// `levels` must be in ingestion order: the declaration order of sources is
/// the order in which they first appear, and decides ties under
/// [`TieBreak::LastDeclared`].
pub fn resolve_priorities(levels: &[SourceLevel], tie_break: TieBreak) -> Result<PriorityResolution> {
    let mut declaration_order: Vec<DataSource> = Vec::new();
    // species -> source -> highest priority the source declares for it
    let mut declared: BTreeMap<Species, BTreeMap<DataSource, i64>> = BTreeMap::new();

    for level in levels.iter().filter(|l| l.source != DataSource::Nist) {
        if !declaration_order.contains(&level.source) {
            declaration_order.push(level.source);
        }
        let priority = declared
            .entry(level.species)
            .or_default()
            .entry(level.source)
            .or_insert(level.priority);
        *priority = (*priority).max(level.priority);
    }

    let mut winners = BTreeMap::new();
    for (species, by_source) in &declared {
        let mut best: Option<(DataSource, i64)> = None;
        for source in &declaration_order {
            let Some(&priority) = by_source.get(source) else {
                continue;
            };
            best = match best {
                None => Some((*source, priority)),
                Some((_, best_priority)) if priority > best_priority => Some((*source, priority)),
                Some((best_source, best_priority)) if priority == best_priority => {
                    match tie_break {
                        TieBreak::Error => {
                            return Err(AtomError::PriorityTie {
                                species: *species,
                                first: best_source.to_string(),
                                second: source.to_string(),
                                priority,
                            })
                        }
                        TieBreak::LastDeclared => {
                            warn!(
                                "{} and {} both declare priority {} for {}; keeping {}.",
                                best_source, source, priority, species, source
                            );
                            Some((*source, priority))
                        }
                    }
                }
                keep => keep,
            };
        }
        if let Some((source, priority)) = best {
            debug!("{} taken from {} (priority {}).", species, source, priority);
            winners.insert(*species, source);
        }
    }

    let resolution = PriorityResolution { winners };
    for (source, species) in resolution.win_sets() {
        info!("Selected species for {}: {}.", source, species_list(&species));
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(species: Species, source: DataSource, priority: i64) -> SourceLevel {
        SourceLevel {
            species,
            level_index: 0,
            g: 1,
            energy: 0.0,
            label: None,
            source,
            priority,
        }
    }

    #[test]
    fn highest_priority_wins() {
        let si2 = Species::new(14, 1);
        let levels = vec![
            level(si2, DataSource::Gfall, 10),
            level(si2, DataSource::Chianti, 5),
        ];
        let resolution = resolve_priorities(&levels, TieBreak::LastDeclared).unwrap();
        assert_eq!(resolution.winner(si2), Some(DataSource::Gfall));
        assert!(resolution.won_by(DataSource::Chianti).is_empty());
    }

    #[test]
    fn nist_never_wins() {
        let h = Species::new(1, 0);
        let levels = vec![level(h, DataSource::Nist, 100)];
        let resolution = resolve_priorities(&levels, TieBreak::LastDeclared).unwrap();
        assert!(resolution.is_empty());
    }

    #[test]
    fn ties_go_to_the_later_source() {
        let fe2 = Species::new(26, 1);
        let levels = vec![
            level(fe2, DataSource::Gfall, 10),
            level(fe2, DataSource::Cmfgen, 10),
        ];
        let resolution = resolve_priorities(&levels, TieBreak::LastDeclared).unwrap();
        assert_eq!(resolution.winner(fe2), Some(DataSource::Cmfgen));
    }

    #[test]
    fn ties_can_be_fatal() {
        let fe2 = Species::new(26, 1);
        let levels = vec![
            level(fe2, DataSource::Gfall, 10),
            level(fe2, DataSource::Cmfgen, 10),
        ];
        match resolve_priorities(&levels, TieBreak::Error) {
            Err(AtomError::PriorityTie { first, second, .. }) => {
                assert_eq!(first, "GFALL");
                assert_eq!(second, "CMFGEN");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn win_sets_are_disjoint() {
        let levels = vec![
            level(Species::new(14, 1), DataSource::Gfall, 10),
            level(Species::new(14, 1), DataSource::Chianti, 20),
            level(Species::new(26, 1), DataSource::Gfall, 10),
            level(Species::new(26, 1), DataSource::Chianti, 1),
        ];
        let resolution = resolve_priorities(&levels, TieBreak::Error).unwrap();
        let sets = resolution.win_sets();
        assert_eq!(sets[&DataSource::Chianti].len(), 1);
        assert_eq!(sets[&DataSource::Gfall].len(), 1);
        assert!(sets[&DataSource::Chianti].is_disjoint(&sets[&DataSource::Gfall]));
    }
}
