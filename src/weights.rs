use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightsError {
    #[error("Weight {index} is negative or not finite: {value}")]
    Invalid { index: usize, value: f64 },
    #[error("Weights sum to zero")]
    ZeroSum,
}

/// Scale non-negative weights so they sum to 1.
pub fn normalize<const N: usize>(raw: [f64; N]) -> Result<[f64; N], WeightsError> {
    for (index, &value) in raw.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(WeightsError::Invalid { index, value });
        }
    }

    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(WeightsError::ZeroSum);
    }

    Ok(raw.map(|w| w / total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_normalizes() {
        let [a, b] = normalize([3.0, 1.0]).unwrap();
        assert_eq!(a, 0.75);
        assert_eq!(b, 0.25);
    }

    #[test]
    fn test_triple_sums_to_one() {
        let w = normalize([0.4, 0.3, 0.3]).unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let w = normalize([2.0, 5.0, 1.0]).unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((w[1] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert_eq!(normalize([0.0, 0.0]), Err(WeightsError::ZeroSum));
        assert!(matches!(
            normalize([1.0, -1.0]),
            Err(WeightsError::Invalid { index: 1, .. })
        ));
        assert!(normalize([f64::NAN, 1.0]).is_err());
    }
}
