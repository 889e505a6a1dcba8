//! Oscillator strengths, Einstein coefficients and frequencies (cgs).

use crate::units::{angstrom_to_hz, einstein_coefficient, C_CGS, H_CGS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiativeQuantities {
    /// Hz
    pub nu: f64,
    pub f_lu: f64,
    pub f_ul: f64,
    /// s^-1
    pub a_ul: f64,
    pub b_lu: f64,
    pub b_ul: f64,
}

impl RadiativeQuantities {
    /// Derive everything from `gf`, the vacuum wavelength [Å] and the
    /// statistical weights of both levels.
    pub fn derive(gf: f64, wavelength: f64, g_lower: i64, g_upper: i64) -> Self {
        let k = einstein_coefficient();
        let nu = angstrom_to_hz(wavelength);
        let f_lu = gf / g_lower as f64;
        let f_ul = gf / g_upper as f64;
        Self {
            nu,
            f_lu,
            f_ul,
            a_ul: 2.0 * k * nu.powi(2) * f_ul / C_CGS.powi(2),
            b_lu: k * f_lu / (H_CGS * nu),
            b_ul: k * f_ul / (H_CGS * nu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn h_alpha_einstein_a() {
        // Hα: gf = 5.1286, g_l = 8, g_u = 18, A_ul = 4.41e7 s^-1
        let q = RadiativeQuantities::derive(5.1286, 6564.61, 8, 18);
        assert_relative_eq!(q.a_ul, 4.41e7, max_relative = 0.01);
        assert_relative_eq!(q.nu, 4.5668e14, max_relative = 1e-4);
    }

    #[test]
    fn detailed_balance_of_b_coefficients() {
        let q = RadiativeQuantities::derive(0.5, 1215.67, 2, 6);
        assert_relative_eq!(2.0 * q.b_lu, 6.0 * q.b_ul, max_relative = 1e-12);
        assert_relative_eq!(q.f_lu * 2.0, q.f_ul * 6.0, max_relative = 1e-12);
    }
}
