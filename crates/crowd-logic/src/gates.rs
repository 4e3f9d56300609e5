//! Gate arithmetic: how an operator gate changes the crowd size.
//!
//! Every gate reduces to a signed delta applied to the current count.
//! Multiplication and division round to the nearest integer with ties to
//! even, so `3 * 1.5` gives 4 and `5 * 0.5` gives 2.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Operator printed on a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Operators offered on freshly placed gates.
pub const ROLLED_OPS: [GateOp; 2] = [GateOp::Add, GateOp::Multiply];

/// Crowd size above which multiply gates are capped.
pub const PROOFING_THRESHOLD: usize = 100;

/// Nearest integer, ties to even.
pub fn round_to_int(value: f32) -> i64 {
    value.round_ties_even() as i64
}

/// Signed change for multiplying a crowd of `count` by `ratio`.
pub fn multiply_delta(count: usize, ratio: f32) -> i64 {
    if ratio.is_nan() {
        return 0;
    }
    round_to_int(count as f32 * ratio).saturating_sub(count as i64)
}

/// Signed change for passing a gate with `op` and `value` at `count`.
pub fn population_delta(op: GateOp, value: f32, count: usize) -> i64 {
    match op {
        GateOp::Add => round_to_int(value),
        GateOp::Subtract => -round_to_int(value),
        GateOp::Multiply => multiply_delta(count, value),
        GateOp::Divide => {
            if value.abs() < f32::EPSILON {
                0
            } else {
                multiply_delta(count, 1.0 / value)
            }
        }
    }
}

/// Range a new gate value is rolled from, given the current crowd.
///
/// Large crowds only see x2/x3 multipliers so one gate cannot explode the
/// population past what the layout can carry.
pub fn value_range(op: GateOp, crowd_count: usize) -> RangeInclusive<u32> {
    match op {
        GateOp::Multiply | GateOp::Divide if crowd_count > PROOFING_THRESHOLD => 2..=3,
        GateOp::Multiply | GateOp::Divide => 2..=6,
        GateOp::Add | GateOp::Subtract => 1..=10,
    }
}

/// Text shown on the gate.
pub fn label(op: GateOp, value: f32) -> String {
    match op {
        GateOp::Add => format!("+{}", round_to_int(value)),
        GateOp::Subtract => format!("-{}", round_to_int(value)),
        GateOp::Multiply => format!("x{}", value),
        GateOp::Divide => format!("÷{}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_multiply_chain() {
        // 1 -> +5 -> 6 -> x2 -> 12
        let mut count = 1usize;
        count = (count as i64 + population_delta(GateOp::Add, 5.0, count)) as usize;
        assert_eq!(count, 6);
        count = (count as i64 + population_delta(GateOp::Multiply, 2.0, count)) as usize;
        assert_eq!(count, 12);
    }

    #[test]
    fn rounding_ties_to_even() {
        assert_eq!(round_to_int(2.5), 2);
        assert_eq!(round_to_int(3.5), 4);
        assert_eq!(multiply_delta(5, 0.5), -3); // 2.5 -> 2
        assert_eq!(multiply_delta(3, 1.5), 1); // 4.5 -> 4
    }

    #[test]
    fn subtract_and_divide() {
        assert_eq!(population_delta(GateOp::Subtract, 3.0, 10), -3);
        assert_eq!(population_delta(GateOp::Divide, 2.0, 10), -5);
    }

    #[test]
    fn divide_by_zero_is_noop() {
        assert_eq!(population_delta(GateOp::Divide, 0.0, 10), 0);
    }

    #[test]
    fn multiply_on_empty_crowd() {
        assert_eq!(multiply_delta(0, 6.0), 0);
    }

    #[test]
    fn extreme_ratios_saturate() {
        assert_eq!(multiply_delta(10, f32::MAX), i64::MAX - 10);
        assert_eq!(multiply_delta(10, f32::MIN), i64::MIN);
        assert_eq!(multiply_delta(10, f32::NAN), 0);
    }

    #[test]
    fn proofing_caps_large_crowds() {
        assert_eq!(value_range(GateOp::Multiply, 100), 2..=6);
        assert_eq!(value_range(GateOp::Multiply, 101), 2..=3);
        assert_eq!(value_range(GateOp::Add, 500), 1..=10);
    }

    #[test]
    fn labels() {
        assert_eq!(label(GateOp::Add, 5.0), "+5");
        assert_eq!(label(GateOp::Multiply, 3.0), "x3");
        assert_eq!(label(GateOp::Subtract, 2.0), "-2");
    }
}
