mod google;

pub use google::*;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::engine::day_start;
use crate::models::RawEvent;

/// Trait for calendar providers
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events overlapping the local calendar day `day` in `tz`, timestamps
    /// left exactly as the provider returned them
    async fn events_for_day(&self, day: NaiveDate, tz: Tz) -> Result<Vec<RawEvent>>;
}

/// Midnight-to-midnight bounds of a local day
pub fn day_bounds(day: NaiveDate, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>) {
    let start = day_start(tz, day);
    let end = day
        .succ_opt()
        .map(|next| day_start(tz, next))
        .unwrap_or(start + chrono::Duration::days(1));
    (start, end)
}
