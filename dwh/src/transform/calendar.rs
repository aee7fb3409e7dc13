use super::TimeRecord;
use chrono::{DateTime, Datelike, Timelike};

/// Breaks an epoch-seconds timestamp down into its UTC calendar fields.
pub fn breakdown(start_time: i64) -> Result<TimeRecord, String> {
    let at = DateTime::from_timestamp(start_time, 0)
        .ok_or_else(|| format!("timestamp {} is out of range", start_time))?;

    Ok(TimeRecord {
        start_time,
        hour: at.hour() as i32,
        day: at.day() as i32,
        week: at.iso_week().week() as i32,
        month: at.month() as i32,
        year: at.year(),
        weekday: at.weekday().num_days_from_monday() as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown() {
        assert_eq!(
            breakdown(1541548796).unwrap(),
            TimeRecord {
                start_time: 1541548796,
                hour: 23,
                day: 6,
                week: 45,
                month: 11,
                year: 2018,
                weekday: 1,
            }
        );
    }

    #[test]
    fn test_breakdown_other_days() {
        let first = breakdown(1541121934).unwrap();
        assert_eq!(
            (first.hour, first.day, first.week, first.month, first.weekday),
            (1, 2, 44, 11, 4)
        );

        let last = breakdown(1543537327).unwrap();
        assert_eq!(
            (last.hour, last.day, last.week, last.month, last.weekday),
            (0, 30, 48, 11, 4)
        );
    }

    #[test]
    fn test_iso_week_crosses_year() {
        // 2018-12-31 belongs to week 1 of 2019.
        let record = breakdown(1546214400).unwrap();
        assert_eq!((record.week, record.year, record.weekday), (1, 2018, 0));
    }

    #[test]
    fn test_out_of_range() {
        assert!(breakdown(i64::MAX).is_err());
    }
}
