//! Day eligibility: per-subscription weekday opt-outs.

use chrono::Weekday;

use delay_common::types::{Subscription, WeekdayFlags};

use crate::clock::Clock;

/// Whether a subscription with these flags fires on `weekday`.
pub fn subscribed_on(flags: &WeekdayFlags, weekday: Weekday) -> bool {
    match weekday {
        Weekday::Mon => flags.monday,
        Weekday::Tue => flags.tuesday,
        Weekday::Wed => flags.wednesday,
        Weekday::Thu => flags.thursday,
        Weekday::Fri => flags.friday,
        Weekday::Sat => flags.saturday,
        Weekday::Sun => flags.sunday,
    }
}

/// Whether the subscriber wants alerts for this subscription today.
pub fn subscribed_for_today(subscription: &Subscription, clock: &dyn Clock) -> bool {
    subscribed_on(&subscription.days, clock.today())
}

#[cfg(test)]
mod tests {
    use super::*;
    use delay_common::types::Day;

    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    #[test]
    fn test_all_flags_off_never_fires() {
        let flags = WeekdayFlags::default();
        for day in WEEK {
            assert!(!subscribed_on(&flags, day));
        }
    }

    #[test]
    fn test_only_today_flag_fires_today() {
        for today in WEEK {
            let flags = WeekdayFlags::from_days(&[Day::from(today)]);
            for day in WEEK {
                assert_eq!(subscribed_on(&flags, day), day == today);
            }
        }
    }

    #[test]
    fn test_other_flags_do_not_affect_today() {
        for today in WEEK {
            let on = WeekdayFlags::from_days(&[Day::from(today)]);
            let others: Vec<Day> = WEEK
                .iter()
                .filter(|d| **d != today)
                .map(|d| Day::from(*d))
                .collect();
            let mut all_others = WeekdayFlags::from_days(&others);

            assert!(subscribed_on(&on, today));
            assert!(!subscribed_on(&all_others, today));

            all_others = WeekdayFlags::every_day();
            assert!(subscribed_on(&all_others, today));
        }
    }

    #[test]
    fn test_thursday_is_reachable() {
        let flags = WeekdayFlags::from_days(&["Thur".parse().unwrap()]);
        assert!(subscribed_on(&flags, Weekday::Thu));
    }
}
