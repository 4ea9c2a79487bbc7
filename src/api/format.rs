use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_ALMOST_TWO_DAYS: i64 = 2520;
const MINUTES_IN_MONTH: i64 = 43200;
const MINUTES_IN_TWO_MONTHS: i64 = 86400;

/// Human-readable distance between `timestamp` and `now` with a direction
/// suffix: "about 3 hours ago", "2 days from now".
///
/// Buckets follow the conventions front-end date libraries use, so the relay
/// output matches what the UI would render client-side.
pub fn format_distance(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let (earlier, later) = if timestamp <= now { (timestamp, now) } else { (now, timestamp) };
    let phrase = distance_phrase(earlier, later);

    if timestamp > now {
        format!("{} from now", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn distance_phrase(earlier: DateTime<Utc>, later: DateTime<Utc>) -> String {
    let seconds = (later - earlier).num_seconds();
    let minutes = round_div(seconds, 60);

    if minutes < 2 {
        return if minutes == 0 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        };
    }
    if minutes < 45 {
        return format!("{} minutes", minutes);
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        return plural("about ", round_div(minutes, 60), "hour");
    }
    if minutes < MINUTES_IN_ALMOST_TWO_DAYS {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        return plural("", round_div(minutes, MINUTES_IN_DAY), "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        return plural("about ", round_div(minutes, MINUTES_IN_MONTH), "month");
    }

    let months = months_between(earlier, later);
    if months < 12 {
        return plural("", round_div(minutes, MINUTES_IN_MONTH), "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => plural("about ", years, "year"),
        3..=8 => plural("over ", years, "year"),
        _ => plural("almost ", years + 1, "year"),
    }
}

fn plural(prefix: &str, count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{}1 {}", prefix, unit)
    } else {
        format!("{}{} {}s", prefix, count, unit)
    }
}

/// Non-negative integer division rounding halves up
fn round_div(value: i64, divisor: i64) -> i64 {
    (value + divisor / 2) / divisor
}

/// Whole months from `earlier` to `later`, counted the way the front-end's date
/// library counts them: step `later` back by the calendar difference and drop a
/// month if that lands before `earlier`. Late February is first pushed to the
/// 30th, rolling into March, and a month ending on its last day counts as full.
fn months_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let calendar = (later.year() as i64 - earlier.year() as i64) * 12
        + (later.month0() as i64 - earlier.month0() as i64);
    if calendar < 1 {
        return 0;
    }

    let day = if later.month0() == 1 && later.day() > 27 { 30 } else { later.day() as i64 };
    let stepped = rolled_date(later.year() as i64, later.month0() as i64, day)
        .and_then(|d| rolled_date(d.year() as i64, d.month0() as i64 - calendar, d.day() as i64))
        .map(|d| d.and_time(later.time()).and_utc());

    let mut partial = stepped.map(|s| s < earlier).unwrap_or(false);
    if calendar == 1 && is_last_day_of_month(later) && later > earlier {
        partial = false;
    }
    calendar - i64::from(partial)
}

/// Date with day and month overflow carried forward, so February 30th is in March
fn rolled_date(year: i64, month0: i64, day: i64) -> Option<NaiveDate> {
    let total = year * 12 + month0;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12) + 1).ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_days(Days::new(u64::try_from(day - 1).ok()?))
}

fn is_last_day_of_month(at: DateTime<Utc>) -> bool {
    at.date_naive()
        .succ_opt()
        .map(|next| next.month() != at.month())
        .unwrap_or(true)
}
