//! Physical constants (cgs) and the unit conversions used by the pipeline.
//!
//! Every derived quantity in the prepared tables is cgs; energies are kept in
//! eV in the level tables and converted with [`EV_TO_ERG`] where they enter a
//! cgs formula.

/// Speed of light [cm s^-1].
pub const C_CGS: f64 = 2.997_924_58e10;
/// Planck constant [erg s].
pub const H_CGS: f64 = 6.626_070_15e-27;
/// Elementary charge [statC].
pub const E_GAUSS: f64 = 4.803_204_712_570_263e-10;
/// Electron mass [g].
pub const M_E_CGS: f64 = 9.109_383_701_5e-28;
/// Boltzmann constant [eV K^-1].
pub const K_B_EV: f64 = 8.617_333_262e-5;
/// One electronvolt [erg].
pub const EV_TO_ERG: f64 = 1.602_176_634e-12;
/// h c [eV cm]: energy of a photon with a wavenumber of 1 cm^-1.
pub const INVERSE_CM_TO_EV: f64 = 1.239_841_984_332_002_6e-4;
/// Rydberg frequency c R_inf [Hz].
pub const RYDBERG_TO_HZ: f64 = 3.289_841_960_250_8e15;
/// One megabarn [cm^2].
pub const MBARN_TO_CM2: f64 = 1e-18;
/// Frequency of a 1 eV photon [Hz], used to check the unit system.
pub const EV_TO_HZ: f64 = 2.417_989_242e14;

/// Above this wavelength [Å] air-convention sources quote air wavelengths.
pub const AIR_THRESHOLD_ANGSTROM: f64 = 2000.0;

/// Classical line-strength constant 4π² e² / (m_e c) [cm^2 s^-1].
pub fn einstein_coefficient() -> f64 {
    4.0 * std::f64::consts::PI.powi(2) * E_GAUSS.powi(2) / (M_E_CGS * C_CGS)
}

pub fn nm_to_angstrom(nm: f64) -> f64 {
    nm * 10.0
}

/// Frequency [Hz] of a wavelength in Å.
pub fn angstrom_to_hz(wavelength: f64) -> f64 {
    C_CGS / (wavelength * 1e-8)
}

/// Level energy from a wavenumber [cm^-1] to eV.
pub fn inverse_cm_to_ev(wavenumber: f64) -> f64 {
    wavenumber * INVERSE_CM_TO_EV
}

pub fn ev_to_erg(energy: f64) -> f64 {
    energy * EV_TO_ERG
}

/// Vacuum → air (Morton 2000, as adopted by VALD). Wavelengths in Å.
pub fn vacuum_to_air(wavelength: f64) -> f64 {
    let s2 = (1e4 / wavelength).powi(2);
    let n = 1.0 + 0.000_083_425_4 + 0.024_061_47 / (130.0 - s2) + 0.000_159_98 / (38.9 - s2);
    wavelength / n
}

/// Air → vacuum (N. Piskunov inversion of Morton 2000). Wavelengths in Å.
pub fn air_to_vacuum(wavelength: f64) -> f64 {
    let s2 = (1e4 / wavelength).powi(2);
    let n = 1.0
        + 0.000_083_366_242_120_83
        + 0.024_089_268_699_68 / (130.106_592_452_2 - s2)
        + 0.000_159_974_089_489_7 / (38.925_687_932_93 - s2);
    wavelength * n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn air_vacuum_round_trip_above_threshold() {
        let mut wavelength = 2000.5;
        while wavelength < 1e5 {
            let back = vacuum_to_air(air_to_vacuum(wavelength));
            assert_relative_eq!(back, wavelength, max_relative = 1e-6);
            let forth = air_to_vacuum(vacuum_to_air(wavelength));
            assert_relative_eq!(forth, wavelength, max_relative = 1e-6);
            wavelength *= 1.37;
        }
    }

    #[test]
    fn h_alpha_air_to_vacuum() {
        // 6562.80 Å in air is 6564.61 Å in vacuum.
        assert_relative_eq!(air_to_vacuum(6562.80), 6564.61, epsilon = 0.02);
    }

    #[test]
    fn frequency_of_one_micron() {
        assert_relative_eq!(angstrom_to_hz(1e4), 2.997_924_58e14, max_relative = 1e-12);
    }

    #[test]
    fn wavenumber_to_ev() {
        // Si II 3s2.3p 2P3/2 at 287.24 cm^-1
        assert_relative_eq!(inverse_cm_to_ev(287.24), 0.035_613, epsilon = 1e-5);
    }

    #[test]
    fn constants_are_cgs() {
        // eV, erg and Hz agree through h
        assert_relative_eq!(EV_TO_ERG / H_CGS, EV_TO_HZ, max_relative = 1e-6);
        assert_relative_eq!(einstein_coefficient(), 0.333_512_59, max_relative = 1e-6);
    }
}
