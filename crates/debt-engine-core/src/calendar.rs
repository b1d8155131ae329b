//! Day and month counts derived from calendar dates.
//!
//! Counts are always computed from dates, never parsed out of strings.
//! Timestamps round partial days up: `ceil(elapsed_ms / 86_400_000)`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Days per month used to turn arrears days into elapsed months.
pub const DAYS_PER_MONTH: Decimal = dec!(30);

/// Signed whole days from `from` to `to`, both taken at midnight.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    elapsed_days(from.and_time(NaiveTime::MIN), to.and_time(NaiveTime::MIN))
}

/// Signed days from `from` to `to`, any started day counting as a full day.
pub fn elapsed_days(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let millis = (to - from).num_milliseconds();
    -((-millis).div_euclid(MILLIS_PER_DAY))
}

/// Days in arrears as of `reference_date`, clamped to zero when the last
/// payment is on or after the reference date.
pub fn days_in_arrears(last_payment_date: NaiveDate, reference_date: NaiveDate) -> i64 {
    days_in_arrears_at(
        last_payment_date.and_time(NaiveTime::MIN),
        reference_date.and_time(NaiveTime::MIN),
    )
}

/// [`days_in_arrears`] for timestamps; a started day of arrears counts in full.
pub fn days_in_arrears_at(last_payment: NaiveDateTime, reference: NaiveDateTime) -> i64 {
    elapsed_days(last_payment, reference).max(0)
}

/// Fractional elapsed months (days / 30).
pub fn elapsed_months(days: i64) -> Decimal {
    Decimal::from(days) / DAYS_PER_MONTH
}
