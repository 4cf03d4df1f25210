use chrono::{NaiveDateTime, NaiveTime};
use std::collections::HashMap;

// Raw precipitation record as it arrives from the forcing table
#[derive(Debug, Clone)]
pub struct PrecipRecord {
    pub time: NaiveDateTime,
    pub flowline_id: i64,
    pub prcp: f64,
}

// Floor timestamps to midnight so records align on calendar days
pub fn normalize_daily(records: &mut [PrecipRecord]) {
    for record in records.iter_mut() {
        record.time = record.time.date().and_time(NaiveTime::MIN);
    }
}

// Total precipitation per flowline over the analysis period
pub fn aggregate_by_flowline(records: &[PrecipRecord]) -> HashMap<i64, f64> {
    let mut sums = HashMap::new();
    for record in records {
        *sums.entry(record.flowline_id).or_insert(0.0) += record.prcp;
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(day: u32, hour: u32, flowline_id: i64, prcp: f64) -> PrecipRecord {
        PrecipRecord {
            time: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(hour, 30, 0)
                .unwrap(),
            flowline_id,
            prcp,
        }
    }

    #[test]
    fn normalize_floors_timestamps_to_midnight() {
        let mut records = vec![record(1, 13, 1, 2.0), record(2, 0, 1, 1.0)];
        normalize_daily(&mut records);
        for r in &records {
            assert_eq!(r.time.time(), NaiveTime::MIN);
        }
        assert_eq!(records[0].time.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn aggregate_sums_per_flowline() {
        let records = vec![
            record(1, 0, 1, 2.0),
            record(2, 0, 1, 3.5),
            record(1, 0, 2, 1.0),
        ];
        let sums = aggregate_by_flowline(&records);
        assert_eq!(sums.len(), 2);
        assert_relative_eq!(sums[&1], 5.5);
        assert_relative_eq!(sums[&2], 1.0);
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate_by_flowline(&[]).is_empty());
    }
}
