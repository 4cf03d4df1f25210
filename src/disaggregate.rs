use crate::travel_time::Hydraulics;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use rayon::prelude::*;

// Observed discharge at the basin outlet, kept sorted ascending by time.
// The series is assumed daily-regular so index shifts mean whole days.
#[derive(Debug, Clone)]
pub struct OutletSeries {
    times: Vec<NaiveDate>,
    discharge: Vec<f64>,
}

impl OutletSeries {
    pub fn new(mut pairs: Vec<(NaiveDate, f64)>) -> Result<Self> {
        if pairs.is_empty() {
            bail!("Outlet discharge series is empty");
        }
        pairs.sort_by_key(|(time, _)| *time);
        let (times, discharge) = pairs.into_iter().unzip();
        Ok(OutletSeries { times, discharge })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[NaiveDate] {
        &self.times
    }

    pub fn discharge(&self) -> &[f64] {
        &self.discharge
    }
}

// Per-flowline results row: weight, lag, and the intermediate hydraulics
// carried into the diagnostics table
#[derive(Debug, Clone)]
pub struct FlowlineCalc {
    pub flowline_id: i64,
    pub to_id: Option<i64>,
    pub length_m: f64,
    pub drainage_area: f64,
    pub area_incr: f64,
    pub influence_score: f64,
    pub runoff_weight: f64,
    pub hydraulics: Option<Hydraulics>,
}

impl FlowlineCalc {
    pub fn travel_time_days(&self) -> i64 {
        self.hydraulics
            .as_ref()
            .map(|h| h.travel_time_days)
            .unwrap_or(0)
    }
}

// One output row of the long-format disaggregated table
#[derive(Debug, Clone)]
pub struct DisaggregatedRow {
    pub flowline_id: i64,
    pub time: NaiveDate,
    pub discharge: f64,
}

// Lag-and-scale redistribution of the outlet series across the network.
// Flowlines with zero or undefined weight are dropped from the result
// entirely. Rows come out flowline-major in the order of `calcs`.
pub fn disaggregate(
    calcs: &[FlowlineCalc],
    outlet: &OutletSeries,
    progress: &ProgressBar,
) -> Vec<DisaggregatedRow> {
    let per_flowline: Vec<Vec<DisaggregatedRow>> = calcs
        .par_iter()
        .map(|calc| {
            let rows = disaggregate_flowline(calc, outlet);
            progress.inc(1);
            rows
        })
        .collect();

    per_flowline.into_iter().flatten().collect()
}

fn disaggregate_flowline(calc: &FlowlineCalc, outlet: &OutletSeries) -> Vec<DisaggregatedRow> {
    let weight = calc.runoff_weight;
    if !(weight > 0.0) {
        return Vec::new();
    }

    let lag = calc.travel_time_days().max(0) as usize;
    let discharge = outlet.discharge();

    outlet
        .times()
        .iter()
        .enumerate()
        .map(|(i, &time)| {
            // The flowline's pulse leads the outlet by the lag: the value at
            // position i is the outlet value at i + lag. Slots shifted past
            // the end of the record are zero-filled; that tail volume is
            // dropped rather than conserved.
            let shifted = discharge.get(i + lag).copied().unwrap_or(0.0);
            DisaggregatedRow {
                flowline_id: calc.flowline_id,
                time,
                discharge: shifted * weight,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn outlet() -> OutletSeries {
        OutletSeries::new(vec![(day(1), 100.0), (day(2), 120.0), (day(3), 90.0)]).unwrap()
    }

    fn calc(flowline_id: i64, weight: f64, lag_days: i64) -> FlowlineCalc {
        let hydraulics = (lag_days != 0).then(|| Hydraulics {
            hydraulic_radius: 1.0,
            velocity_mps: 1.0,
            segment_travel_time_s: lag_days as f64 * 86400.0,
            total_travel_time_s: lag_days as f64 * 86400.0,
            travel_time_days: lag_days,
        });
        FlowlineCalc {
            flowline_id,
            to_id: None,
            length_m: 100.0,
            drainage_area: 1.0,
            area_incr: 1.0,
            influence_score: weight,
            runoff_weight: weight,
            hydraulics,
        }
    }

    #[test]
    fn series_is_sorted_ascending_on_construction() {
        let series =
            OutletSeries::new(vec![(day(3), 90.0), (day(1), 100.0), (day(2), 120.0)]).unwrap();
        assert_eq!(series.times(), &[day(1), day(2), day(3)]);
        assert_eq!(series.discharge(), &[100.0, 120.0, 90.0]);
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(OutletSeries::new(Vec::new()).is_err());
    }

    #[test]
    fn lagged_weighted_shift_matches_the_worked_example() {
        // weight 0.5, lag 1 day over [100, 120, 90] gives [60, 45, 0]
        let rows = disaggregate(&[calc(1, 0.5, 1)], &outlet(), &ProgressBar::hidden());

        assert_eq!(rows.len(), 3);
        assert_relative_eq!(rows[0].discharge, 60.0);
        assert_relative_eq!(rows[1].discharge, 45.0);
        assert_relative_eq!(rows[2].discharge, 0.0);
        assert_eq!(rows[0].time, day(1));
        assert_eq!(rows[2].time, day(3));
    }

    #[test]
    fn zero_lag_is_a_pure_weight_scale() {
        let rows = disaggregate(&[calc(1, 0.25, 0)], &outlet(), &ProgressBar::hidden());
        for (row, expected) in rows.iter().zip([25.0, 30.0, 22.5]) {
            assert_relative_eq!(row.discharge, expected);
        }
    }

    #[test]
    fn zero_weight_flowline_is_absent_from_the_output() {
        let rows = disaggregate(
            &[calc(1, 0.0, 0), calc(2, 0.5, 0)],
            &outlet(),
            &ProgressBar::hidden(),
        );
        assert!(rows.iter().all(|row| row.flowline_id == 2));
    }

    #[test]
    fn nan_weight_flowline_is_absent_from_the_output() {
        let rows = disaggregate(&[calc(1, f64::NAN, 0)], &outlet(), &ProgressBar::hidden());
        assert!(rows.is_empty());
    }

    #[test]
    fn uniform_weights_scale_linearly_with_no_hidden_normalization() {
        let n = 4;
        let calcs: Vec<FlowlineCalc> = (1..=n).map(|id| calc(id, 1.0 / n as f64, 0)).collect();
        let rows = disaggregate(&calcs, &outlet(), &ProgressBar::hidden());

        let series = outlet();
        for (i, &time) in series.times().iter().enumerate() {
            let sum: f64 = rows
                .iter()
                .filter(|row| row.time == time)
                .map(|row| row.discharge)
                .sum();
            assert_relative_eq!(sum, series.discharge()[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn lag_beyond_series_length_zeroes_the_whole_flowline() {
        let rows = disaggregate(&[calc(1, 1.0, 10)], &outlet(), &ProgressBar::hidden());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.discharge == 0.0));
    }

    #[test]
    fn output_order_is_flowline_major_and_deterministic() {
        let calcs = vec![calc(5, 0.5, 0), calc(2, 0.5, 0)];
        let rows = disaggregate(&calcs, &outlet(), &ProgressBar::hidden());
        let ids: Vec<i64> = rows.iter().map(|row| row.flowline_id).collect();
        assert_eq!(ids, vec![5, 5, 5, 2, 2, 2]);
    }
}
