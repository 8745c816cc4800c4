use chrono::{DateTime, FixedOffset, Utc};

/// Format used for the `today` / `date` workflow inputs.
pub const TODAY_FORMAT: &str = "%Y年%m月%d日 %H:%M:%S";

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn format_today(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format(TODAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};

    use super::{format_today, Clock, FixedClock};

    #[test]
    fn formats_today_in_configured_offset() {
        let now = Utc.with_ymd_and_hms(2024, 10, 31, 16, 5, 9).single().expect("valid instant");
        let jst = FixedOffset::east_opt(9 * 3600).expect("valid offset");

        assert_eq!(format_today(now, jst), "2024年11月01日 01:05:09");
    }

    #[test]
    fn fixed_clock_returns_its_instant() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().expect("valid instant");
        assert_eq!(FixedClock(now).now_utc(), now);
    }
}
