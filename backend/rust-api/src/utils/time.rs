use chrono::{DateTime, Months, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

pub fn bson_now() -> BsonDateTime {
    chrono_to_bson(Utc::now())
}

/// Analytics window: one week, one month or one year back from `now`.
/// Unknown values fall back to one month.
pub fn timeframe_start(now: DateTime<Utc>, timeframe: &str) -> DateTime<Utc> {
    match timeframe {
        "week" => now - chrono::Duration::days(7),
        "year" => now
            .checked_sub_months(Months::new(12))
            .unwrap_or(now - chrono::Duration::days(365)),
        _ => now
            .checked_sub_months(Months::new(1))
            .unwrap_or(now - chrono::Duration::days(30)),
    }
}
