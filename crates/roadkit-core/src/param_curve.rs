//! Keyframed scalar curves evaluated over a normalized progress value.
//!
//! Lane width, lane vertical offset and prefab lateral offset are all
//! authored as one of these.

use serde::{Deserialize, Serialize};

/// A single key: `value` at normalized `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

/// Piecewise-linear curve over `[0, 1]`, clamped outside the key range.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct ParamCurve {
    keys: Vec<CurveKey>,
}

impl From<Vec<CurveKey>> for ParamCurve {
    fn from(keys: Vec<CurveKey>) -> Self {
        Self::new(keys)
    }
}

impl From<ParamCurve> for Vec<CurveKey> {
    fn from(curve: ParamCurve) -> Self {
        curve.keys
    }
}

impl ParamCurve {
    /// Build from keys; keys are sorted and non-finite keys dropped.
    pub fn new(keys: Vec<CurveKey>) -> Self {
        let mut keys: Vec<CurveKey> = keys
            .into_iter()
            .filter(|k| k.time.is_finite() && k.value.is_finite())
            .collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey { time: 0.0, value }])
    }

    pub fn linear(from: f32, to: f32) -> Self {
        Self::new(vec![
            CurveKey {
                time: 0.0,
                value: from,
            },
            CurveKey {
                time: 1.0,
                value: to,
            },
        ])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Evaluate at `t`. Never returns NaN: an empty curve or a NaN `t`
    /// evaluates to `0.0` / the first key respectively.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0.0,
        };
        if t.is_nan() || t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }
        let idx = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[idx - 1];
        let b = self.keys[idx];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        a.value + (b.value - a.value) * ((t - a.time) / span)
    }

    /// Largest value over `[0, 1]`. Keys are the only extrema of a
    /// piecewise-linear curve, plus the clamped ends.
    pub fn max_value(&self) -> f32 {
        let mut max = self.evaluate(0.0).max(self.evaluate(1.0));
        for k in &self.keys {
            if (0.0..=1.0).contains(&k.time) {
                max = max.max(k.value);
            }
        }
        max
    }

    /// Whether the curve evaluates to (nearly) zero everywhere.
    pub fn is_zero(&self) -> bool {
        self.keys.iter().all(|k| k.value.abs() <= f32::EPSILON)
    }
}
