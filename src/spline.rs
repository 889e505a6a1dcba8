//! Interpolating cubic spline with not-a-knot end conditions.
//!
//! Same curve as an `s = 0`, `k = 3` B-spline fit through the points; outside
//! the data range the first/last cubic piece is extended.

use nalgebra::{DMatrix, DVector};

use crate::error::{AtomError, Result};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit through `(x, y)`; `x` strictly increasing, at least 4 points.
    pub fn not_a_knot(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n != y.len() {
            return Err(AtomError::InvalidData(format!(
                "spline needs as many values as knots, got {} and {}",
                n,
                y.len()
            )));
        }
        if n < 4 {
            return Err(AtomError::InvalidData(format!(
                "cubic spline needs at least 4 points, got {n}"
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(AtomError::InvalidData(
                "spline knots must be strictly increasing".into(),
            ));
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);

        // third derivative continuous across x[1] and x[n-2]
        a[(0, 0)] = h[1];
        a[(0, 1)] = -(h[0] + h[1]);
        a[(0, 2)] = h[0];
        a[(n - 1, n - 3)] = h[n - 2];
        a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
        a[(n - 1, n - 1)] = h[n - 3];

        for i in 1..n - 1 {
            a[(i, i - 1)] = h[i - 1];
            a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a[(i, i + 1)] = h[i];
            rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        let m = a
            .lu()
            .solve(&rhs)
            .ok_or_else(|| AtomError::InvalidData("singular spline system".into()))?;

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m: m.iter().copied().collect(),
        })
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let last = self.x.len() - 2;
        // interval i holds x[i] <= at < x[i+1]; outside, the end pieces
        let i = self.x[1..=last].partition_point(|&knot| knot <= at).min(last);

        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let (left, right) = (at - x0, x1 - at);

        m0 * right.powi(3) / (6.0 * h)
            + m1 * left.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * right
            + (y1 / h - m1 * h / 6.0) * left
    }
}

/// `count` evenly spaced points over `[0, 1]`.
pub fn unit_linspace(count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..count)
            .map(|i| i as f64 / (count - 1) as f64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cubic(x: f64) -> f64 {
        1.5 * x.powi(3) - 2.0 * x.powi(2) + 0.25 * x + 0.7
    }

    #[test]
    fn reproduces_a_cubic_everywhere() {
        let x = unit_linspace(5);
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let spline = CubicSpline::not_a_knot(&x, &y).unwrap();
        for at in [-0.3, 0.0, 0.1, 0.37, 0.5, 0.81, 1.0, 1.4, 2.0] {
            assert_relative_eq!(spline.evaluate(at), cubic(at), epsilon = 1e-10);
        }
    }

    #[test]
    fn four_points_give_the_interpolating_cubic() {
        let x = [0.0, 0.2, 0.7, 1.0];
        let y: Vec<f64> = x.iter().map(|&v| cubic(v)).collect();
        let spline = CubicSpline::not_a_knot(&x, &y).unwrap();
        assert_relative_eq!(spline.evaluate(0.45), cubic(0.45), epsilon = 1e-10);
    }

    #[test]
    fn passes_through_the_data() {
        let x = unit_linspace(9);
        let y = [0.21, 0.28, 0.33, 0.41, 0.40, 0.52, 0.61, 0.66, 0.72];
        let spline = CubicSpline::not_a_knot(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y) {
            assert_relative_eq!(spline.evaluate(*xi), yi, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_short_or_unsorted_input() {
        assert!(CubicSpline::not_a_knot(&[0.0, 0.5, 1.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(CubicSpline::not_a_knot(&[0.0, 0.5, 0.5, 1.0], &[1.0, 2.0, 3.0, 4.0]).is_err());
        assert!(CubicSpline::not_a_knot(&[0.0, 0.5, 0.7, 1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn linspace_endpoints() {
        assert_eq!(unit_linspace(5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(unit_linspace(1), vec![0.0]);
    }
}
