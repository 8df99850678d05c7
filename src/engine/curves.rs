//! Precomputed response curves
//!
//! The volume curve is a logarithmic-feeling fade:
//! `(10^t - 1) / 9` for `t` in 0..1, so the low end stays near silence
//! and the top step lands on unity.
//!
//! The balance curves use a cubic taper around the center, renormalized so
//! the louder side always sits at unity and only the quieter side is cut.

/// Number of discrete control steps (one MIDI data byte)
pub const CONTROL_STEPS: usize = 128;

/// Highest control value
pub const MAX_CONTROL_VALUE: u8 = (CONTROL_STEPS - 1) as u8;

/// Balance control value for the center position
pub const CENTER_BALANCE: u8 = (CONTROL_STEPS / 2) as u8;

/// Volume and balance lookup tables, indexed by control value
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTables {
    volume: [f64; CONTROL_STEPS],
    balance_left: [f64; CONTROL_STEPS],
    balance_right: [f64; CONTROL_STEPS],
}

impl CurveTables {
    /// Compute all tables
    pub fn build() -> Self {
        let mut volume = [0.0; CONTROL_STEPS];
        let mut balance_left = [0.0; CONTROL_STEPS];
        let mut balance_right = [0.0; CONTROL_STEPS];

        for i in 0..CONTROL_STEPS {
            volume[i] = volume_at(i);
            let (left, right) = balance_at(i);
            balance_left[i] = left;
            balance_right[i] = right;
        }

        Self {
            volume,
            balance_left,
            balance_right,
        }
    }

    /// Volume multiplier for a control value
    #[inline]
    pub fn volume(&self, value: u8) -> f64 {
        self.volume[index(value)]
    }

    /// Left and right balance multipliers for a control value
    #[inline]
    pub fn balance(&self, value: u8) -> (f64, f64) {
        let i = index(value);
        (self.balance_left[i], self.balance_right[i])
    }

    /// The full volume table
    pub fn volume_table(&self) -> &[f64; CONTROL_STEPS] {
        &self.volume
    }

    /// The full left balance table
    pub fn balance_left_table(&self) -> &[f64; CONTROL_STEPS] {
        &self.balance_left
    }

    /// The full right balance table
    pub fn balance_right_table(&self) -> &[f64; CONTROL_STEPS] {
        &self.balance_right
    }

    /// Iterate rows of `(index, volume, left, right)`
    pub fn rows(&self) -> impl Iterator<Item = (usize, f64, f64, f64)> + '_ {
        (0..CONTROL_STEPS).map(move |i| (i, self.volume[i], self.balance_left[i], self.balance_right[i]))
    }
}

// Data bytes are 7 bit; mask so out-of-range values cannot index past the table.
#[inline]
fn index(value: u8) -> usize {
    (value & MAX_CONTROL_VALUE) as usize
}

fn volume_at(i: usize) -> f64 {
    let t = i as f64 / MAX_CONTROL_VALUE as f64;
    let v = (10.0_f64.powf(t) - 1.0) / 9.0;
    // Clamp floating point overshoot at the top step
    v.min(1.0)
}

fn balance_at(i: usize) -> (f64, f64) {
    // -1.0 is full left, 1.0 full right
    let b = 2.0 * (i as f64 / MAX_CONTROL_VALUE as f64 - 0.5);

    let left = -b * b.powi(2) / 2.0 + 0.5;
    let right = 1.0 - left;

    let scale = if b >= 0.0 { 1.0 / right } else { 1.0 / left };

    (scale * left, scale * right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_curve_bounds() {
        let tables = CurveTables::build();

        for (i, &v) in tables.volume_table().iter().enumerate() {
            assert!((0.0..=1.0).contains(&v), "volume[{}] = {} out of range", i, v);
        }
        assert_eq!(tables.volume(0), 0.0);
        assert_eq!(tables.volume(MAX_CONTROL_VALUE), 1.0);
    }

    #[test]
    fn test_volume_curve_non_decreasing() {
        let tables = CurveTables::build();
        let volume = tables.volume_table();

        for i in 1..CONTROL_STEPS {
            assert!(volume[i] >= volume[i - 1], "volume[{}] < volume[{}]", i, i - 1);
        }
    }

    #[test]
    fn test_volume_curve_is_logarithmic() {
        let tables = CurveTables::build();

        // Halfway up the fader is well below half amplitude
        let mid = tables.volume(64);
        assert!(mid > 0.2 && mid < 0.3, "Expected ~0.24, got {}", mid);
    }

    #[test]
    fn test_balance_louder_side_is_unity() {
        let tables = CurveTables::build();

        for value in 0..=MAX_CONTROL_VALUE {
            let (left, right) = tables.balance(value);
            let louder = left.max(right);
            assert!((louder - 1.0).abs() < 1e-12, "balance[{}] louder side = {}", value, louder);
            assert!(left >= 0.0 && right >= 0.0);
        }
    }

    #[test]
    fn test_balance_center() {
        let tables = CurveTables::build();
        let (left, right) = tables.balance(CENTER_BALANCE);

        // 64 sits just right of the exact center of 0..127
        assert!((left - 1.0).abs() < 1e-5, "Expected ~1.0, got {}", left);
        assert!((right - 1.0).abs() < 1e-12, "Expected 1.0, got {}", right);
    }

    #[test]
    fn test_balance_extremes() {
        let tables = CurveTables::build();

        assert_eq!(tables.balance(0), (1.0, 0.0));

        let (left, right) = tables.balance(MAX_CONTROL_VALUE);
        assert!(left.abs() < 1e-12);
        assert!((right - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_balance_attenuates_quieter_side_monotonically() {
        let tables = CurveTables::build();
        let right = tables.balance_right_table();

        // Panning left only ever pulls the right channel down
        for i in 1..CENTER_BALANCE as usize {
            assert!(right[i] >= right[i - 1]);
        }
    }

    #[test]
    fn test_balance_right_of_center_attenuates_left() {
        let tables = CurveTables::build();
        let left = tables.balance_left_table();

        for i in CENTER_BALANCE as usize + 1..CONTROL_STEPS {
            assert!(left[i] <= left[i - 1], "left[{}] > left[{}]", i, i - 1);
        }
        assert!(left[CONTROL_STEPS - 1].abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_value_is_masked() {
        let tables = CurveTables::build();
        assert_eq!(tables.volume(128 + 5), tables.volume(5));
    }

    #[test]
    fn test_rows_cover_all_steps() {
        let tables = CurveTables::build();
        let rows: Vec<_> = tables.rows().collect();

        assert_eq!(rows.len(), CONTROL_STEPS);
        assert_eq!(rows[127].1, 1.0);
    }
}
