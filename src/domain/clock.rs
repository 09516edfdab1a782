use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampMs(pub i64);

impl TimestampMs {
    /// `None` when the value is outside chrono's representable range.
    pub fn to_iso8601(self) -> Option<String> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(Utc::now().timestamp_millis())
    }
}
