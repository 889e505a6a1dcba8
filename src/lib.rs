//! Curates atomic levels, lines, collision strengths and photoionization
//! cross sections from several sources into the prepared tables consumed by
//! a radiative-transfer code.

pub mod atom_data;
pub mod collisions;
pub mod compare;
pub mod config;
pub mod culling;
pub mod error;
pub mod frame;
pub mod gfall;
pub mod io;
pub mod ionization;
pub mod levels;
pub mod lines;
pub mod macro_atom;
pub mod photoionization;
pub mod priority;
pub mod radiative;
pub mod schema;
pub mod source;
pub mod species;
pub mod spline;
pub mod units;

#[cfg(feature = "python")]
mod python;

pub use atom_data::{AtomData, AtomDataInputs, PreparedTable, RunMetadata};
pub use compare::AtomDataCompare;
pub use config::{PipelineConfig, TemperatureGrid, TieBreak};
pub use error::{AtomError, Result};
pub use gfall::GfallIngester;
pub use ionization::IonizationEnergies;
pub use source::SourceTables;
pub use species::{DataSource, Species};
