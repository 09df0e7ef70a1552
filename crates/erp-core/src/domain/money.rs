//! Integer money arithmetic. Amounts are minor units (cents), rates are
//! basis points (1/100 of a percent).

pub const BPS_DENOMINATOR: i64 = 10_000;

/// `amount * bps / 10_000` rounded half away from zero.
pub fn apply_bps(amount: i64, bps: i32) -> i64 {
    let product = amount as i128 * bps as i128;
    let denom = BPS_DENOMINATOR as i128;
    let half = denom / 2;
    let rounded = if product >= 0 {
        (product + half) / denom
    } else {
        (product - half) / denom
    };
    rounded as i64
}

/// `None` on overflow.
pub fn checked_sum(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
    amounts.into_iter().try_fold(0i64, |acc, v| acc.checked_add(v))
}
