/// Lower bound of the tempo range dances are choreographed for.
pub const BPM_FLOOR: f64 = 60.0;
/// Upper bound of the tempo range dances are choreographed for.
pub const BPM_CEILING: f64 = 200.0;

/// Min-max normalize amplitudes across a whole song.
///
/// A song with no amplitude contrast maps every segment to 0.5.
pub fn normalize_amplitudes(amplitudes: &[f64]) -> Vec<f64> {
    let Some(&first) = amplitudes.first() else {
        return Vec::new();
    };

    let (min, max) = amplitudes
        .iter()
        .fold((first, first), |(lo, hi), &a| (lo.min(a), hi.max(a)));

    if max > min {
        amplitudes.iter().map(|a| (a - min) / (max - min)).collect()
    } else {
        vec![0.5; amplitudes.len()]
    }
}

/// Map a tempo onto [0, 1] over the fixed dance range. Tempos outside the
/// range saturate.
pub fn normalize_bpm(bpm: f64) -> f64 {
    ((bpm - BPM_FLOOR) / (BPM_CEILING - BPM_FLOOR)).clamp(0.0, 1.0)
}

/// Normalize per-segment amplitude and tempo for a whole song.
pub fn normalize_features(amplitudes: &[f64], bpms: &[f64]) -> (Vec<f64>, Vec<f64>) {
    (
        normalize_amplitudes(amplitudes),
        bpms.iter().map(|&b| normalize_bpm(b)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_amplitude_is_half() {
        assert_eq!(normalize_amplitudes(&[5.0, 5.0, 5.0]), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_amplitude_min_max() {
        let normed = normalize_amplitudes(&[0.1, 0.3, 0.2]);
        assert!((normed[0] - 0.0).abs() < 1e-12);
        assert!((normed[1] - 1.0).abs() < 1e-12);
        assert!((normed[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_song() {
        assert!(normalize_amplitudes(&[]).is_empty());
        let (a, b) = normalize_features(&[], &[]);
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn test_bpm_clamps() {
        assert_eq!(normalize_bpm(40.0), 0.0);
        assert_eq!(normalize_bpm(260.0), 1.0);
        assert!((normalize_bpm(130.0) - 0.5).abs() < 1e-12);
        assert_eq!(normalize_bpm(60.0), 0.0);
        assert_eq!(normalize_bpm(200.0), 1.0);
    }
}
