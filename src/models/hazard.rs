//! Hazard function of the gamma distribution.

use crate::errors::{GillespieError, Result};

const MAX_ITERATIONS: usize = 500;
const EPSILON: f64 = 1e-14;
const FPMIN: f64 = 1e-300;

const LANCZOS: [f64; 6] = [
    76.18009172947146,
    -86.50532032941677,
    24.01409824083091,
    -1.231739572450155,
    0.1208650973866179e-2,
    -0.5395239384953e-5,
];

/// Logarithm of the gamma function for positive arguments (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000000000190015;
    for coefficient in LANCZOS {
        y += 1.;
        series += coefficient / y;
    }
    -tmp + (2.5066282746310005 * series / x).ln()
}

/// Hazard `f(t) / S(t)` of a gamma distribution with `shape` and `scale`.
///
/// For `shape >= 1` the hazard increases monotonically towards its bound `1 / scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GammaHazard {
    shape: f64,
    scale: f64,
    ln_gamma_shape: f64,
}

impl GammaHazard {
    pub fn new(shape: f64, scale: f64) -> Result<Self> {
        if !(shape.is_finite() && shape >= 1.) {
            return Err(GillespieError::InvalidParameter {
                key: "incubation_shape".to_string(),
                reason: format!("{shape} is not a finite value >= 1"),
            });
        }
        if !(scale.is_finite() && scale > 0.) {
            return Err(GillespieError::InvalidParameter {
                key: "incubation_scale".to_string(),
                reason: format!("{scale} is not a finite positive value"),
            });
        }
        Ok(Self {
            shape,
            scale,
            ln_gamma_shape: ln_gamma(shape),
        })
    }

    pub fn bound(&self) -> f64 {
        1. / self.scale
    }

    pub fn hazard(&self, t: f64) -> f64 {
        if t <= 0. {
            return match self.shape == 1. {
                true => self.bound(),
                false => 0.,
            };
        }

        let a = self.shape;
        let x = t / self.scale;
        let hazard = if x < a + 1. {
            // lower series, survival is the complement
            let ln_prefactor = -x + a * x.ln() - self.ln_gamma_shape;
            let mut term = 1. / a;
            let mut sum = term;
            let mut ap = a;
            for _ in 0..MAX_ITERATIONS {
                ap += 1.;
                term *= x / ap;
                sum += term;
                if term.abs() < sum.abs() * EPSILON {
                    break;
                }
            }
            let survival = 1. - sum * ln_prefactor.exp();
            let density = (ln_prefactor - x.ln()).exp() / self.scale;
            density / survival
        } else {
            // continued fraction of the upper incomplete gamma function (modified Lentz)
            let mut b = x + 1. - a;
            let mut c = 1. / FPMIN;
            let mut d = 1. / b;
            let mut fraction = d;
            for i in 1..=MAX_ITERATIONS {
                let an = -(i as f64) * (i as f64 - a);
                b += 2.;
                d = an * d + b;
                if d.abs() < FPMIN {
                    d = FPMIN;
                }
                c = b + an / c;
                if c.abs() < FPMIN {
                    c = FPMIN;
                }
                d = 1. / d;
                let delta = d * c;
                fraction *= delta;
                if (delta - 1.).abs() < EPSILON {
                    break;
                }
            }
            1. / (self.scale * x * fraction)
        };

        hazard.clamp(0., self.bound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_gamma_matches_factorials() {
        for (n, factorial) in [(1., 1.), (2., 1.), (5., 24.), (10., 362880.)] {
            assert!((ln_gamma(n) - f64::ln(factorial)).abs() < 1e-8);
        }
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-9);
    }

    #[test]
    fn exponential_hazard_is_constant() {
        let hazard = GammaHazard::new(1., 4.).unwrap();
        for t in [0., 0.5, 3., 10., 100.] {
            assert!((hazard.hazard(t) - 0.25).abs() < 1e-9, "t={t}");
        }
    }

    #[test]
    fn shape_two_hazard_is_closed_form() {
        let scale = 2.;
        let hazard = GammaHazard::new(2., scale).unwrap();
        assert_eq!(hazard.hazard(0.), 0.);
        for t in [0.1, 1., 4., 7.5, 30.] {
            let x: f64 = t / scale;
            let expected = x / (scale * (1. + x));
            assert!((hazard.hazard(t) - expected).abs() < 1e-9, "t={t}");
        }
    }

    #[test]
    fn hazard_is_monotonic_and_bounded() {
        let hazard = GammaHazard::new(5.8, 0.95).unwrap();
        let values: Vec<f64> = (0..400).map(|i| hazard.hazard(i as f64 * 0.1)).collect();
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1] + 1e-9));
        assert!(values.iter().all(|&value| value <= hazard.bound()));
        assert!(hazard.hazard(1e4) > 0.99 * hazard.bound());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(GammaHazard::new(0.5, 1.).is_err());
        assert!(GammaHazard::new(2., 0.).is_err());
        assert!(GammaHazard::new(f64::NAN, 1.).is_err());
    }
}
