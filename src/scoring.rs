use crate::attributes::AttributeRecord;
use crate::config::{DisaggregationParams, EPSILON};
use anyhow::{Result, bail};

// Influence score and its max-relative weight for one flowline
#[derive(Debug, Clone)]
pub struct ScoredFlowline {
    pub flowline_id: i64,
    pub influence_score: f64,
    pub runoff_weight: f64,
}

// score = area^alpha * rc^beta * prcp^gamma / (ksat^omega + eps)
// weight = score / (max_score + eps), so the top-scoring flowline gets 1.
// Weights are relative influence, not a partition; they need not sum to 1.
pub fn score_influence(
    records: &[AttributeRecord],
    params: &DisaggregationParams,
) -> Result<Vec<ScoredFlowline>> {
    let mut scored = Vec::with_capacity(records.len());

    for record in records {
        let area = require(record.area, record.flowline_id, "area")?;
        let runoff_coeff = require(record.runoff_coeff, record.flowline_id, "avg_runoff_coeff")?;
        let prcp_sum = require(record.prcp_sum, record.flowline_id, "prcp_sum")?;
        let ksat = require(record.ksat, record.flowline_id, "ksat")?;

        let influence_score = area.powf(params.alpha)
            * runoff_coeff.powf(params.beta)
            * prcp_sum.powf(params.gamma)
            / (ksat.powf(params.omega) + EPSILON);

        if !influence_score.is_finite() {
            bail!(
                "Influence score for flowline {} is not finite",
                record.flowline_id
            );
        }

        scored.push(ScoredFlowline {
            flowline_id: record.flowline_id,
            influence_score,
            runoff_weight: 0.0,
        });
    }

    let max_score = scored
        .iter()
        .map(|s| s.influence_score)
        .fold(0.0_f64, f64::max);
    for flowline in &mut scored {
        flowline.runoff_weight = flowline.influence_score / (max_score + EPSILON);
    }

    Ok(scored)
}

fn require(value: Option<f64>, flowline_id: i64, field: &str) -> Result<f64> {
    match value {
        Some(v) => Ok(v),
        None => bail!(
            "Missing {} for flowline {}; check the input table join keys",
            field,
            flowline_id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AreaBasis, RunoffLevel};
    use approx::assert_relative_eq;

    fn params() -> DisaggregationParams {
        DisaggregationParams {
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            omega: 1.0,
            runoff_level: RunoffLevel::Level1,
            area_basis: AreaBasis::Cumulative,
            use_travel_time_dilation: false,
            scale_inputs: false,
        }
    }

    fn record(flowline_id: i64, area: f64, rc: f64, prcp: f64, ksat: f64) -> AttributeRecord {
        AttributeRecord {
            flowline_id,
            area: Some(area),
            runoff_coeff: Some(rc),
            prcp_sum: Some(prcp),
            ksat: Some(ksat),
        }
    }

    #[test]
    fn score_matches_the_power_law() {
        let scored = score_influence(&[record(1, 2.0, 0.5, 3.0, 4.0)], &params()).unwrap();
        assert_relative_eq!(scored[0].influence_score, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn weights_lie_in_unit_interval_and_max_is_one() {
        let records = vec![
            record(1, 2.0, 0.4, 5.0, 1.0),
            record(2, 9.0, 0.9, 8.0, 0.5),
            record(3, 1.0, 0.1, 2.0, 3.0),
        ];
        let scored = score_influence(&records, &params()).unwrap();

        let max_weight = scored
            .iter()
            .map(|s| s.runoff_weight)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(max_weight, 1.0, epsilon = 1e-6);
        for flowline in &scored {
            assert!(flowline.runoff_weight > 0.0);
            assert!(flowline.runoff_weight <= 1.0);
        }
    }

    #[test]
    fn zero_exponent_leaves_a_neutral_term() {
        let mut p = params();
        p.omega = 0.0;
        // ksat^0 = 1, so the denominator becomes 2 regardless of ksat
        let scored = score_influence(&[record(1, 4.0, 0.5, 1.0, 123.0)], &p).unwrap();
        assert_relative_eq!(scored[0].influence_score, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn scores_do_not_depend_on_row_order() {
        let records = vec![
            record(1, 2.0, 0.4, 5.0, 1.0),
            record(2, 9.0, 0.9, 8.0, 0.5),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let forward = score_influence(&records, &params()).unwrap();
        let backward = score_influence(&reversed, &params()).unwrap();

        for flowline in &forward {
            let twin = backward
                .iter()
                .find(|s| s.flowline_id == flowline.flowline_id)
                .unwrap();
            assert_relative_eq!(twin.influence_score, flowline.influence_score);
            assert_relative_eq!(twin.runoff_weight, flowline.runoff_weight);
        }
    }

    #[test]
    fn missing_field_names_the_flowline_and_column() {
        let mut incomplete = record(7, 1.0, 0.5, 1.0, 1.0);
        incomplete.prcp_sum = None;
        let message = score_influence(&[incomplete], &params())
            .unwrap_err()
            .to_string();
        assert!(message.contains("prcp_sum"), "got: {}", message);
        assert!(message.contains("flowline 7"), "got: {}", message);
    }

    #[test]
    fn all_zero_scores_produce_all_zero_weights() {
        let scored = score_influence(&[record(1, 1.0, 0.0, 1.0, 1.0)], &params()).unwrap();
        assert_relative_eq!(scored[0].runoff_weight, 0.0);
    }
}
