//! Macro-atom transition network: every kept line adds one emission and two
//! internal jumps between its levels, held in a directed graph of levels.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use polars::prelude::*;
use tracing::info;

use crate::culling::{LevelsLines, PreparedLevel, PreparedLine};
use crate::error::{AtomError, Result};
use crate::schema::{macro_atom, references, species, transition_type};
use crate::species::Species;
use crate::units::{ev_to_erg, C_CGS, H_CGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionType {
    /// Radiative de-excitation, upper → lower.
    EmissionDown,
    /// Internal jump down, upper → lower.
    InternalDown,
    /// Internal jump up, lower → upper.
    InternalUp,
}

impl TransitionType {
    pub const ALL: [TransitionType; 3] = [
        TransitionType::EmissionDown,
        TransitionType::InternalDown,
        TransitionType::InternalUp,
    ];

    pub fn code(self) -> i64 {
        match self {
            TransitionType::EmissionDown => transition_type::EMISSION_DOWN,
            TransitionType::InternalDown => transition_type::INTERNAL_DOWN,
            TransitionType::InternalUp => transition_type::INTERNAL_UP,
        }
    }

    /// Unnormalized probability of this transition through `line`, with
    /// level energies in erg.
    fn probability(self, line: &PreparedLine, energy_lower: f64, energy_upper: f64) -> f64 {
        let q = &line.radiative;
        let emission = 2.0 * q.nu.powi(2) * q.f_ul / C_CGS.powi(2);
        match self {
            TransitionType::EmissionDown => emission * (energy_upper - energy_lower),
            TransitionType::InternalDown => emission * energy_lower,
            TransitionType::InternalUp => q.f_lu * energy_lower / (H_CGS * q.nu),
        }
    }
}

/// Node payload: the level a macro-atom state sits on.
#[derive(Debug, Clone)]
struct LevelNode {
    species: Species,
    level_number: i64,
}

/// Edge payload.
#[derive(Debug, Clone)]
struct Transition {
    line_id: i64,
    kind: TransitionType,
    probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroAtomTransition {
    pub species: Species,
    pub source_level_number: i64,
    pub target_level_number: i64,
    pub transition_line_id: i64,
    pub transition_type: TransitionType,
    pub transition_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroAtomReference {
    pub species: Species,
    pub source_level_number: i64,
    pub count_down: i64,
    pub count_up: i64,
    pub count_total: i64,
}

/// Transition graph of the macro atom: one node per level, three edges per
/// line.
pub struct MacroAtom {
    graph: DiGraph<LevelNode, Transition>,
    /// Nodes in (atomic_number, ion_number, level_number) order.
    nodes: Vec<NodeIndex>,
    transitions: Vec<MacroAtomTransition>,
}

impl MacroAtom {
    pub fn build(levels_lines: &LevelsLines) -> Result<Self> {
        info!("Creating macro atom transitions.");

        let mut graph = DiGraph::new();
        let mut node_map: HashMap<i64, NodeIndex> = HashMap::new();
        let mut nodes = Vec::new();
        for level in levels_lines.levels().iter().filter(|l| !l.is_placeholder()) {
            let idx = graph.add_node(LevelNode {
                species: level.species,
                level_number: level.level_number,
            });
            node_map.insert(level.level_id, idx);
            nodes.push(idx);
        }

        for line in levels_lines.lines() {
            let (Some(lower), Some(upper)) = (
                levels_lines.level(line.lower_level_id),
                levels_lines.level(line.upper_level_id),
            ) else {
                return Err(dangling(line));
            };
            let (Some(&lower_idx), Some(&upper_idx)) = (
                node_map.get(&line.lower_level_id),
                node_map.get(&line.upper_level_id),
            ) else {
                return Err(dangling(line));
            };
            add_line_edges(&mut graph, line, (lower, lower_idx), (upper, upper_idx));
        }

        let mut transitions: Vec<MacroAtomTransition> = graph
            .edge_indices()
            .filter_map(|e| {
                let (source, target) = graph.edge_endpoints(e)?;
                let edge = &graph[e];
                Some(MacroAtomTransition {
                    species: graph[source].species,
                    source_level_number: graph[source].level_number,
                    target_level_number: graph[target].level_number,
                    transition_line_id: edge.line_id,
                    transition_type: edge.kind,
                    transition_probability: edge.probability,
                })
            })
            .collect();
        transitions.sort_by(|a, b| {
            a.species
                .cmp(&b.species)
                .then(a.source_level_number.cmp(&b.source_level_number))
        });

        info!(
            "Created {} macro atom transitions for {} levels.",
            transitions.len(),
            nodes.len()
        );
        Ok(Self {
            graph,
            nodes,
            transitions,
        })
    }

    pub fn transitions(&self) -> &[MacroAtomTransition] {
        &self.transitions
    }

    /// Per level: lines it is the upper level of, lines it is the lower level
    /// of, and the number of macro-atom transitions leaving it.
    pub fn references(&self) -> Vec<MacroAtomReference> {
        self.nodes
            .iter()
            .map(|&idx| {
                let mut count_down = 0;
                let mut count_up = 0;
                for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                    match edge.weight().kind {
                        TransitionType::EmissionDown => count_down += 1,
                        TransitionType::InternalUp => count_up += 1,
                        TransitionType::InternalDown => {}
                    }
                }
                let node = &self.graph[idx];
                MacroAtomReference {
                    species: node.species,
                    source_level_number: node.level_number,
                    count_down,
                    count_up,
                    count_total: 2 * count_down + count_up,
                }
            })
            .collect()
    }

    /// Transitions with the `target_level_number` column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        self.frame(macro_atom::TARGET_LEVEL_NUMBER)
    }

    /// Transitions as exported, with `destination_level_number`.
    pub fn macro_atom_prepared(&self) -> Result<DataFrame> {
        self.frame(macro_atom::DESTINATION_LEVEL_NUMBER)
    }

    fn frame(&self, target_column: &str) -> Result<DataFrame> {
        let n = self.transitions.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut source = Vec::with_capacity(n);
        let mut target = Vec::with_capacity(n);
        let mut line_id = Vec::with_capacity(n);
        let mut kind = Vec::with_capacity(n);
        let mut probability = Vec::with_capacity(n);
        for t in &self.transitions {
            atomic_number.push(t.species.atomic_number);
            ion_number.push(t.species.ion_number);
            source.push(t.source_level_number);
            target.push(t.target_level_number);
            line_id.push(t.transition_line_id);
            kind.push(t.transition_type.code());
            probability.push(t.transition_probability);
        }
        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(macro_atom::SOURCE_LEVEL_NUMBER.into(), &source),
            Column::new(target_column.into(), &target),
            Column::new(macro_atom::TRANSITION_TYPE.into(), &kind),
            Column::new(macro_atom::TRANSITION_PROBABILITY.into(), &probability),
            Column::new(macro_atom::TRANSITION_LINE_ID.into(), &line_id),
        ])?)
    }

    pub fn references_prepared(&self) -> Result<DataFrame> {
        let refs = self.references();
        let mut atomic_number = Vec::with_capacity(refs.len());
        let mut ion_number = Vec::with_capacity(refs.len());
        let mut source = Vec::with_capacity(refs.len());
        let mut down = Vec::with_capacity(refs.len());
        let mut up = Vec::with_capacity(refs.len());
        let mut total = Vec::with_capacity(refs.len());
        for r in &refs {
            atomic_number.push(r.species.atomic_number);
            ion_number.push(r.species.ion_number);
            source.push(r.source_level_number);
            down.push(r.count_down);
            up.push(r.count_up);
            total.push(r.count_total);
        }
        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(macro_atom::SOURCE_LEVEL_NUMBER.into(), &source),
            Column::new(references::COUNT_DOWN.into(), &down),
            Column::new(references::COUNT_UP.into(), &up),
            Column::new(references::COUNT_TOTAL.into(), &total),
        ])?)
    }
}

fn add_line_edges(
    graph: &mut DiGraph<LevelNode, Transition>,
    line: &PreparedLine,
    (lower, lower_idx): (&PreparedLevel, NodeIndex),
    (upper, upper_idx): (&PreparedLevel, NodeIndex),
) {
    let energy_lower = ev_to_erg(lower.energy);
    let energy_upper = ev_to_erg(upper.energy);
    for kind in TransitionType::ALL {
        let (from, to) = match kind {
            TransitionType::InternalUp => (lower_idx, upper_idx),
            TransitionType::EmissionDown | TransitionType::InternalDown => (upper_idx, lower_idx),
        };
        graph.add_edge(
            from,
            to,
            Transition {
                line_id: line.line_id,
                kind,
                probability: kind.probability(line, energy_lower, energy_upper),
            },
        );
    }
}

fn dangling(line: &PreparedLine) -> AtomError {
    AtomError::Validation(format!(
        "line {} of {} points at a culled level",
        line.line_id, line.species
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, TieBreak};
    use crate::ionization::IonizationEnergies;
    use crate::levels::LevelRegistry;
    use crate::lines::LineConsolidator;
    use crate::priority::resolve_priorities;
    use crate::source::{SourceLevel, SourceLine};
    use crate::species::DataSource;
    use approx::assert_relative_eq;

    /// H I n=1, n=2, n=3 with Lyα, Lyβ and Hα.
    fn hydrogen() -> LevelsLines {
        let h = Species::new(1, 0);
        let level = |index, g, energy| SourceLevel {
            species: h,
            level_index: index,
            g,
            energy,
            label: None,
            source: DataSource::Chianti,
            priority: 10,
        };
        let line = |lower, upper, nm, gf| SourceLine {
            species: h,
            level_index_lower: lower,
            level_index_upper: upper,
            wavelength: nm,
            gf,
            source: DataSource::Chianti,
        };
        let source_levels = vec![level(0, 2, 0.0), level(1, 8, 10.198_8), level(2, 18, 12.087_5)];
        let source_lines = vec![
            line(0, 1, 121.567, 0.8324),
            line(0, 2, 102.572, 0.1582),
            line(1, 2, 656.461, 5.1286),
        ];
        let resolution = resolve_priorities(&source_levels, TieBreak::Error).unwrap();
        let registry = LevelRegistry::consolidate(&[], &source_levels, resolution).unwrap();
        let consolidated = LineConsolidator::new(&registry)
            .consolidate(&source_lines)
            .unwrap();
        let ionization = IonizationEnergies::from_energies([(h, 13.598_434)]);
        LevelsLines::build(&registry, &consolidated, &ionization, &PipelineConfig::default())
            .unwrap()
    }

    #[test]
    fn three_transitions_per_line() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        assert_eq!(atom.transitions().len(), 9);
        for line_id in 1..=3 {
            let mut kinds: Vec<i64> = atom
                .transitions()
                .iter()
                .filter(|t| t.transition_line_id == line_id)
                .map(|t| t.transition_type.code())
                .collect();
            kinds.sort();
            assert_eq!(kinds, vec![-1, 0, 1]);
        }
    }

    #[test]
    fn sorted_by_source_level() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        let sources: Vec<i64> = atom
            .transitions()
            .iter()
            .map(|t| t.source_level_number)
            .collect();
        let mut sorted = sources.clone();
        sorted.sort();
        assert_eq!(sources, sorted);
        // ground level only has the two upward jumps
        assert_eq!(&sources[..2], &[0, 0]);
    }

    #[test]
    fn h_alpha_probabilities_are_cgs() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        let h_alpha = |kind| {
            atom.transitions()
                .iter()
                .find(|t| t.transition_line_id == 3 && t.transition_type == kind)
                .map(|t| t.transition_probability)
                .unwrap()
        };
        assert_relative_eq!(h_alpha(TransitionType::InternalUp), 3.46, max_relative = 0.01);
        assert_relative_eq!(h_alpha(TransitionType::EmissionDown), 4.0e-4, max_relative = 0.02);
        // E_l / (E_u - E_l) = 10.1988 / 1.8887
        assert_relative_eq!(
            h_alpha(TransitionType::InternalDown) / h_alpha(TransitionType::EmissionDown),
            10.198_8 / (12.087_5 - 10.198_8),
            max_relative = 1e-9
        );
    }

    #[test]
    fn lyman_lines_have_no_internal_probability_from_ground() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        for t in atom.transitions().iter().filter(|t| t.transition_line_id < 3) {
            match t.transition_type {
                TransitionType::InternalUp | TransitionType::InternalDown => {
                    assert_eq!(t.transition_probability, 0.0)
                }
                TransitionType::EmissionDown => assert!(t.transition_probability > 0.0),
            }
        }
    }

    #[test]
    fn reference_counts() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        let refs = atom.references();
        assert_eq!(refs.len(), 3);
        let counts: Vec<(i64, i64, i64)> = refs
            .iter()
            .map(|r| (r.count_down, r.count_up, r.count_total))
            .collect();
        assert_eq!(counts, vec![(0, 2, 2), (1, 1, 3), (2, 0, 4)]);
        for r in &refs {
            assert_eq!(r.count_total, 2 * r.count_down + r.count_up);
        }
    }

    #[test]
    fn prepared_frame_renames_target() {
        let atom = MacroAtom::build(&hydrogen()).unwrap();
        let df = atom.macro_atom_prepared().unwrap();
        assert!(df.column("destination_level_number").is_ok());
        assert!(df.column("target_level_number").is_err());
        assert!(atom.to_frame().unwrap().column("target_level_number").is_ok());
        assert_eq!(atom.references_prepared().unwrap().height(), 3);
    }
}
