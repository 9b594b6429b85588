use chrono::NaiveDate;

/// Whether a model last tested on `last_tested` should be tested on `today`.
///
/// A model becomes due once strictly more than `frequency_days` days have
/// elapsed, so a frequency of 0 means "the day after every test".
#[must_use]
pub fn is_due(last_tested: NaiveDate, frequency_days: i32, today: NaiveDate) -> bool {
    (today - last_tested).num_days() > i64::from(frequency_days)
}
