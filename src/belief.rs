use std::f64::consts::{FRAC_1_SQRT_2, PI};

use statrs::function::erf::erfc;

use crate::error::BeliefError;

/// Multiply a mean by its precision.
#[inline]
pub fn natural_mean(precision: f64, mean: f64) -> f64 {
    precision * mean
}

/// Recover a mean from its natural (precision-weighted) form.
#[inline]
pub fn mean(precision: f64, natural_mean: f64) -> f64 {
    natural_mean / precision
}

pub fn variance(precision: f64) -> Result<f64, BeliefError> {
    if precision > 0.0 {
        Ok(1.0 / precision)
    } else {
        Err(BeliefError::NonPositivePrecision { precision })
    }
}

pub fn std(precision: f64) -> Result<f64, BeliefError> {
    variance(precision).map(f64::sqrt)
}

/// Density of the standard normal distribution.
#[inline]
pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Cumulative distribution function of the standard normal distribution.
#[inline]
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Additive mean correction for a standard normal truncated to values
/// greater than `-x`: `φ(x) / Φ(x)`.
#[inline]
pub fn psi(x: f64) -> f64 {
    standard_normal_pdf(x) / standard_normal_cdf(x)
}

/// Multiplicative variance correction matching [`psi`]:
/// `ψ(x) · (ψ(x) + x)`, which lies in `(0, 1)`.
#[inline]
pub fn lambda(x: f64) -> f64 {
    let psi = psi(x);
    psi * (psi + x)
}

/// A Gaussian belief over a latent value, represented by its mean and its
/// precision (inverse variance).
///
/// Products and quotients of beliefs are computed on the natural parameters
/// `(precision * mean, precision)`, where they reduce to sums and
/// differences.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Belief {
    pub mean: f64,
    pub precision: f64,
}

impl Default for Belief {
    fn default() -> Belief {
        Belief::UNIFORM
    }
}

impl Belief {
    /// The zero message. Neutral element of [`Belief::product`].
    pub const UNIFORM: Belief = Belief {
        mean: 0.0,
        precision: 0.0,
    };

    /// Zero-centered unit Gaussian.
    pub const STANDARD: Belief = Belief {
        mean: 0.0,
        precision: 1.0,
    };

    #[inline]
    pub const fn new(mean: f64, precision: f64) -> Belief {
        Belief { mean, precision }
    }

    /// Build a belief from natural parameters. A zero precision yields
    /// [`Belief::UNIFORM`], since its mean is undefined.
    #[inline]
    pub fn from_natural(natural_mean: f64, precision: f64) -> Belief {
        if precision == 0.0 {
            Belief::UNIFORM
        } else {
            Belief {
                mean: mean(precision, natural_mean),
                precision,
            }
        }
    }

    pub fn from_mean_variance(mean: f64, variance: f64) -> Result<Belief, BeliefError> {
        if !(variance > 0.0) {
            return Err(BeliefError::NonPositiveVariance { variance });
        }
        Belief {
            mean,
            precision: 1.0 / variance,
        }
        .checked()
    }

    #[inline]
    pub fn natural_mean(self) -> f64 {
        natural_mean(self.precision, self.mean)
    }

    #[inline]
    pub fn variance(self) -> Result<f64, BeliefError> {
        variance(self.precision)
    }

    #[inline]
    pub fn std(self) -> Result<f64, BeliefError> {
        std(self.precision)
    }

    /// Fails unless the belief is proper: finite mean and a finite, strictly
    /// positive precision.
    pub fn checked(self) -> Result<Belief, BeliefError> {
        if !self.mean.is_finite() || !self.precision.is_finite() {
            Err(BeliefError::NonFinite {
                mean: self.mean,
                precision: self.precision,
            })
        } else if self.precision <= 0.0 {
            Err(BeliefError::NonPositivePrecision {
                precision: self.precision,
            })
        } else {
            Ok(self)
        }
    }

    /// Product of two Gaussian densities, up to normalization.
    #[must_use]
    #[inline]
    pub fn product(self, other: Belief) -> Belief {
        Belief::from_natural(
            self.natural_mean() + other.natural_mean(),
            self.precision + other.precision,
        )
    }

    /// Quotient of two Gaussian densities, up to normalization. The
    /// quotient must remain a proper belief.
    pub fn divide(self, other: Belief) -> Result<Belief, BeliefError> {
        let precision = self.precision - other.precision;
        if !(precision > 0.0) {
            return Err(BeliefError::NonPositivePrecision { precision });
        }
        Belief::from_natural(self.natural_mean() - other.natural_mean(), precision).checked()
    }

    /// Moment-matched Gaussian approximation of this belief truncated to
    /// positive values.
    ///
    /// Fails with [`BeliefError::NoPositiveMass`] when the mass above zero
    /// underflows, roughly 38 standard deviations below the mean.
    pub fn truncate_positive(self) -> Result<Belief, BeliefError> {
        let std = self.std()?;
        let t = self.mean / std;
        let (psi, lambda) = (psi(t), lambda(t));
        if !psi.is_finite() || !lambda.is_finite() {
            return Err(BeliefError::NoPositiveMass {
                mean: self.mean,
                precision: self.precision,
            });
        }
        Belief::from_mean_variance(self.mean + std * psi, self.variance()? * (1.0 - lambda))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_normal() {
        assert!((standard_normal_pdf(0.0) - 0.398_942_280_401_432_7).abs() < 1e-15);
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-15);
        assert!((standard_normal_cdf(1.0) - 0.841_344_746_068_542_9).abs() < 1e-10);
        assert!((standard_normal_cdf(-1.0) - 0.158_655_253_931_457_1).abs() < 1e-10);
    }

    #[test]
    fn test_psi_lambda_at_zero() {
        assert!((psi(0.0) - (2.0 / PI).sqrt()).abs() < 1e-12);
        assert!((lambda(0.0) - 2.0 / PI).abs() < 1e-12);
    }

    #[test]
    fn test_lambda_in_unit_interval() {
        for x in [-20.0, -5.0, -1.0, 0.0, 0.5, 3.0, 10.0] {
            let l = lambda(x);
            assert!(l > 0.0 && l < 1.0, "lambda({x}) = {l}");
        }
    }

    #[test]
    fn test_variance_requires_positive_precision() {
        assert_eq!(variance(4.0), Ok(0.25));
        assert_eq!(std(4.0), Ok(0.5));
        assert_eq!(
            variance(0.0),
            Err(BeliefError::NonPositivePrecision { precision: 0.0 })
        );
        assert!(std(-1.0).is_err());
    }

    #[test]
    fn test_product_and_divide() {
        let a = Belief::new(1.0, 2.0);
        let b = Belief::new(-3.0, 0.5);
        let ab = a.product(b);
        assert_eq!(ab.precision, 2.5);
        assert!((ab.mean - (2.0 - 1.5) / 2.5).abs() < 1e-15);

        let back = ab.divide(b).unwrap();
        assert!((back.mean - a.mean).abs() < 1e-12);
        assert!((back.precision - a.precision).abs() < 1e-12);

        assert_eq!(a.product(Belief::UNIFORM), a);
    }

    #[test]
    fn test_divide_rejects_improper_result() {
        let a = Belief::new(0.0, 1.0);
        assert!(matches!(
            a.divide(Belief::new(0.0, 1.0)),
            Err(BeliefError::NonPositivePrecision { .. })
        ));
        assert!(matches!(
            a.divide(Belief::new(2.0, 3.0)),
            Err(BeliefError::NonPositivePrecision { precision }) if precision == -2.0
        ));
    }

    #[test]
    fn test_truncate_positive_shifts_mean_and_shrinks_variance() {
        let prior = Belief::new(0.0, 1.0 / 3.0);
        let truncated = prior.truncate_positive().unwrap();
        assert!((truncated.mean - 3f64.sqrt() * (2.0 / PI).sqrt()).abs() < 1e-12);
        assert!(
            (truncated.variance().unwrap() - 3.0 * (1.0 - 2.0 / PI)).abs() < 1e-12
        );

        let unlikely = Belief::new(-2.0, 1.0).truncate_positive().unwrap();
        assert!(unlikely.mean > 0.0);
        assert!(unlikely.precision > 1.0);
    }

    #[test]
    fn test_truncate_positive_far_below_zero() {
        assert!(psi(-40.0).is_nan());
        assert_eq!(
            Belief::new(-40.0, 1.0).truncate_positive(),
            Err(BeliefError::NoPositiveMass {
                mean: -40.0,
                precision: 1.0,
            })
        );
        assert!(Belief::new(-30.0, 1.0).truncate_positive().is_ok());
    }

    #[test]
    fn test_truncate_positive_of_improper_belief() {
        assert!(Belief::UNIFORM.truncate_positive().is_err());
    }
}
