use chrono::{DateTime, Datelike, Local, Utc, Weekday};

/// Source of "now" for the cooldown window and day eligibility.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's weekday in the host's local timezone.
    fn today(&self) -> Weekday {
        self.now().with_timezone(&Local).weekday()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
