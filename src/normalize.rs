//! Score normalisation shared by every metric.

/// Maps `value` onto a 0-100 score over the fixed range `[min, max]`.
///
/// Values outside the range are clamped. With `inverse`, lower values score
/// higher. A degenerate range (`min == max`) yields the neutral score 50.
/// The result is rounded to two decimals.
pub fn normalize(value: f64, min: f64, max: f64, inverse: bool) -> f64 {
    if min == max {
        return 50.0;
    }

    let mut position = ((value - min) / (max - min)).clamp(0.0, 1.0);
    if position.is_nan() {
        position = 0.0;
    }
    if inverse {
        position = 1.0 - position;
    }

    round_to(position * 100.0, 2)
}

/// A metric's calibration: the raw range that maps onto 0-100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
    /// Lower raw values are better.
    pub inverse: bool,
}

impl ScoreRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            inverse: false,
        }
    }

    pub const fn inverted(self) -> Self {
        Self {
            inverse: true,
            ..self
        }
    }

    pub fn score(&self, value: f64) -> f64 {
        normalize(value, self.min, self.max, self.inverse)
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_range_is_neutral() {
        assert_eq!(normalize(0.0, 3.0, 3.0, false), 50.0);
        assert_eq!(normalize(-100.0, 3.0, 3.0, true), 50.0);
        assert_eq!(normalize(1e9, 0.0, 0.0, false), 50.0);
    }

    #[test]
    fn clamps_to_bounds() {
        assert_eq!(normalize(-1.0, 0.0, 5.0, false), 0.0);
        assert_eq!(normalize(10.0, 0.0, 5.0, false), 100.0);
        assert_eq!(normalize(-1.0, 0.0, 30.0, true), 100.0);
        assert_eq!(normalize(45.0, 0.0, 30.0, true), 0.0);
    }

    #[test]
    fn interpolates_and_rounds() {
        assert_eq!(normalize(2.5, 0.0, 5.0, false), 50.0);
        assert_eq!(normalize(0.1, 0.0, 0.3, false), 33.33);
        assert_eq!(normalize(2.0, 0.0, 30.0, true), 93.33);
    }

    #[test]
    fn monotonic_in_value() {
        let values: Vec<f64> = (-10..=60).map(|v| v as f64 * 0.1).collect();
        for pair in values.windows(2) {
            assert!(normalize(pair[0], 0.0, 5.0, false) <= normalize(pair[1], 0.0, 5.0, false));
            assert!(normalize(pair[0], 0.0, 5.0, true) >= normalize(pair[1], 0.0, 5.0, true));
        }
    }

    #[test]
    fn score_range_applies_inversion() {
        let range = ScoreRange::new(0.0, 0.5).inverted();
        assert_eq!(range.score(0.0), 100.0);
        assert_eq!(range.score(0.5), 0.0);
        assert_eq!(range.score(0.25), 50.0);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(2.345678, 4), 2.3457);
        assert_eq!(round_to(1.005, 0), 1.0);
        assert_eq!(round_to(0.125, 2), 0.13);
    }
}
