/// Column-name constants for the atomkit tables.
/// Single source of truth - the prepared tables are read by name downstream,
/// so these strings must not change.

// ── Species key ─────────────────────────────────────────────────────────────
pub mod species {
    pub const ATOMIC_NUMBER: &str = "atomic_number";
    pub const ION_NUMBER: &str = "ion_number";
    /// Alias used by some readers for `ion_number`.
    pub const ION_CHARGE: &str = "ion_charge";
}

// ── Levels ──────────────────────────────────────────────────────────────────
pub mod levels {
    pub const LEVEL_ID: &str = "level_id";
    pub const LEVEL_INDEX: &str = "level_index";
    pub const LEVEL_NUMBER: &str = "level_number";
    pub const ENERGY: &str = "energy";
    pub const G: &str = "g";
    pub const J: &str = "j";
    pub const LABEL: &str = "label";
    pub const METHOD: &str = "method";
    pub const PRIORITY: &str = "priority";
    pub const DS_ID: &str = "ds_id";
    pub const METASTABLE: &str = "metastable";
    pub const CONFIGURATION: &str = "configuration";
}

// ── Lines ───────────────────────────────────────────────────────────────────
pub mod lines {
    pub const LINE_ID: &str = "line_id";
    pub const LEVEL_INDEX_LOWER: &str = "level_index_lower";
    pub const LEVEL_INDEX_UPPER: &str = "level_index_upper";
    pub const LOWER_LEVEL_ID: &str = "lower_level_id";
    pub const UPPER_LEVEL_ID: &str = "upper_level_id";
    pub const LEVEL_NUMBER_LOWER: &str = "level_number_lower";
    pub const LEVEL_NUMBER_UPPER: &str = "level_number_upper";
    pub const WAVELENGTH: &str = "wavelength";
    pub const GF: &str = "gf";
    pub const LOGGF: &str = "loggf";
    pub const NU: &str = "nu";
    pub const F_LU: &str = "f_lu";
    pub const F_UL: &str = "f_ul";
    pub const A_UL: &str = "A_ul";
    pub const B_LU: &str = "B_lu";
    pub const B_UL: &str = "B_ul";
}

// ── Ionization energies ─────────────────────────────────────────────────────
pub mod ionization {
    pub const IONIZATION_ENERGY: &str = "ionization_energy";
}

// ── Macro atom ──────────────────────────────────────────────────────────────
pub mod macro_atom {
    pub const SOURCE_LEVEL_NUMBER: &str = "source_level_number";
    pub const TARGET_LEVEL_NUMBER: &str = "target_level_number";
    /// Name of the target column in the prepared (exported) table.
    pub const DESTINATION_LEVEL_NUMBER: &str = "destination_level_number";
    pub const TRANSITION_LINE_ID: &str = "transition_line_id";
    pub const TRANSITION_TYPE: &str = "transition_type";
    pub const TRANSITION_PROBABILITY: &str = "transition_probability";
}

// ── Macro atom references ───────────────────────────────────────────────────
pub mod references {
    pub const COUNT_DOWN: &str = "count_down";
    pub const COUNT_UP: &str = "count_up";
    pub const COUNT_TOTAL: &str = "count_total";
}

// ── Collisions ──────────────────────────────────────────────────────────────
pub mod collisions {
    pub const E_COL_ID: &str = "e_col_id";
    pub const TTYPE: &str = "ttype";
    pub const CUPS: &str = "cups";
    pub const BTEMP: &str = "btemp";
    pub const BSCUPS: &str = "bscups";
    pub const G_RATIO: &str = "g_ratio";
    pub const DELTA_E: &str = "delta_e";

    /// Name of the collisional factor column for a temperature in K.
    pub fn temperature_column(temperature: u32) -> String {
        format!("t{temperature:06}")
    }
}

// ── Photoionization cross sections ──────────────────────────────────────────
pub mod cross_sections {
    pub const X_SECT_ID: &str = "x_sect_id";
    /// Photon energy in Rydberg (input).
    pub const ENERGY: &str = "energy";
    /// Cross section in Mbarn (input).
    pub const SIGMA: &str = "sigma";
    pub const NU: &str = "nu";
    pub const X_SECT: &str = "x_sect";
}

// ── GFALL parsed rows ───────────────────────────────────────────────────────
pub mod gfall {
    pub const WAVELENGTH: &str = "wavelength";
    pub const LOGGF: &str = "loggf";
    pub const ELEMENT_CODE: &str = "element_code";
    pub const E_FIRST: &str = "e_first";
    pub const J_FIRST: &str = "j_first";
    pub const LABEL_FIRST: &str = "label_first";
    pub const E_SECOND: &str = "e_second";
    pub const J_SECOND: &str = "j_second";
    pub const LABEL_SECOND: &str = "label_second";
}

// ── Metadata and comparison tables ──────────────────────────────────────────
pub mod metadata {
    pub const FIELD: &str = "field";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

pub mod comparison {
    pub const TABLE: &str = "table";
    pub const EXISTS_1: &str = "exists_1";
    pub const EXISTS_2: &str = "exists_2";
    pub const MATCH: &str = "match";
}

// ── Transition types ────────────────────────────────────────────────────────
pub mod transition_type {
    pub const EMISSION_DOWN: i64 = -1;
    pub const INTERNAL_DOWN: i64 = 0;
    pub const INTERNAL_UP: i64 = 1;
}
