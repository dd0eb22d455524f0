use super::range::{round_to, COMPARE_DECIMALS};

/// Strict three-way ordering across time-ordered price snapshots:
/// `a > (b - tolerance_b) > (c - tolerance_c)`.
///
/// The tolerances model allowed slack on the later snapshots. All three
/// operands must be present; an absent (or non-finite) operand never holds.
pub fn holds(
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
    tolerance_b: Option<f64>,
    tolerance_c: Option<f64>,
) -> bool {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (Some(a), Some(b), Some(c)) = (finite(a), finite(b), finite(c)) else {
        return false;
    };

    let a = round_to(a, COMPARE_DECIMALS);
    let b = round_to(b - tolerance_b.unwrap_or(0.0), COMPARE_DECIMALS);
    let c = round_to(c - tolerance_c.unwrap_or(0.0), COMPARE_DECIMALS);
    a > b && b > c
}
