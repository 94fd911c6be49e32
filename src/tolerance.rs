//! Tolerance abstraction to allow scalar or vector tolerances

use crate::Float;

/// Tolerance enum to allow scalar or vector tolerances
/// using [`Into`] trait for easy conversion from `Float`, `[Float; N]`, or `Vec<Float>`
/// users do not need to know or worry this simply allows both
/// `Float` and `[Float; N]` to be passed in as arguments.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub enum Tolerance {
    Scalar(Float),
    Vector(Vec<Float>),
}

impl Tolerance {
    /// Largest component.
    pub fn max(&self) -> Float {
        match self {
            Tolerance::Scalar(v) => *v,
            Tolerance::Vector(vs) => vs.iter().copied().fold(0.0, Float::max),
        }
    }

    /// Checks that every component is finite and positive and, for vector
    /// tolerances, that the length matches `n` when it is known.
    pub(crate) fn validate(&self, n: Option<usize>) -> Result<(), crate::Error> {
        let check = |v: Float| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(crate::Error::InvalidTolerance(v))
            }
        };
        match self {
            Tolerance::Scalar(v) => check(*v),
            Tolerance::Vector(vs) => {
                if let Some(n) = n.filter(|&n| n != vs.len()) {
                    return Err(crate::Error::DimensionMismatch {
                        expected: n,
                        found: vs.len(),
                    });
                }
                vs.iter().try_for_each(|&v| check(v))
            }
        }
    }
}

impl From<Float> for Tolerance {
    fn from(val: Float) -> Self {
        Tolerance::Scalar(val)
    }
}

impl From<&[Float]> for Tolerance {
    fn from(val: &[Float]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl<const N: usize> From<[Float; N]> for Tolerance {
    fn from(val: [Float; N]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl From<Vec<Float>> for Tolerance {
    fn from(val: Vec<Float>) -> Self {
        Tolerance::Vector(val)
    }
}

impl std::ops::Index<usize> for Tolerance {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            Tolerance::Scalar(v) => v,
            Tolerance::Vector(vs) => &vs[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Tolerance;
    use crate::Error;

    #[test]
    fn scalar_indexes_every_component() {
        let tol = Tolerance::from(1e-6);
        assert_eq!(tol[0], 1e-6);
        assert_eq!(tol[41], 1e-6);
        assert_eq!(tol.max(), 1e-6);
    }

    #[test]
    fn vector_validation() {
        let tol = Tolerance::from([1e-6, 1e-3]);
        assert_eq!(tol.max(), 1e-3);
        assert!(tol.validate(Some(2)).is_ok());
        assert!(tol.validate(None).is_ok());
        assert_eq!(
            tol.validate(Some(3)),
            Err(Error::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            Tolerance::from(-1.0).validate(None),
            Err(Error::InvalidTolerance(-1.0))
        );
    }
}
