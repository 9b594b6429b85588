use chrono::NaiveDate;

/// Monitoring configuration and state for one model.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ModelRecord {
    pub name: String,
    pub owner_email: String,
    pub test_frequency_days: i32,
    pub last_tested_date: NaiveDate,
}
