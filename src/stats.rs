use crate::disaggregate::DisaggregatedRow;
use chrono::NaiveDate;
use std::collections::HashMap;

// Observed discharge at an evaluation site, joined to predictions by
// (site_id, time) where site_id matches a flowline_id
#[derive(Debug, Clone)]
pub struct ObservedDischarge {
    pub site_id: i64,
    pub time: NaiveDate,
    pub discharge: f64,
}

// Goodness-of-fit metrics for one evaluation site
#[derive(Debug, Clone)]
pub struct SiteMetrics {
    pub site_id: i64,
    pub pairs: usize,
    pub nse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub index_of_agreement: f64,
}

// Nash-Sutcliffe efficiency: 1 - SSE / variance of the observations
pub fn nse(simulated: &[f64], observed: &[f64]) -> f64 {
    let pairs = finite_pairs(simulated, observed);
    if pairs.is_empty() {
        return f64::NAN;
    }
    let mean_obs = pairs.iter().map(|(_, o)| o).sum::<f64>() / pairs.len() as f64;
    let sse: f64 = pairs.iter().map(|(s, o)| (s - o).powi(2)).sum();
    let variance: f64 = pairs.iter().map(|(_, o)| (o - mean_obs).powi(2)).sum();
    1.0 - sse / variance
}

pub fn rmse(simulated: &[f64], observed: &[f64]) -> f64 {
    let pairs = finite_pairs(simulated, observed);
    if pairs.is_empty() {
        return f64::NAN;
    }
    let mse: f64 =
        pairs.iter().map(|(s, o)| (s - o).powi(2)).sum::<f64>() / pairs.len() as f64;
    mse.sqrt()
}

pub fn mae(simulated: &[f64], observed: &[f64]) -> f64 {
    let pairs = finite_pairs(simulated, observed);
    if pairs.is_empty() {
        return f64::NAN;
    }
    pairs.iter().map(|(s, o)| (s - o).abs()).sum::<f64>() / pairs.len() as f64
}

// Squared Pearson correlation between simulated and observed
pub fn r_squared(simulated: &[f64], observed: &[f64]) -> f64 {
    let pairs = finite_pairs(simulated, observed);
    if pairs.is_empty() {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_sim = pairs.iter().map(|(s, _)| s).sum::<f64>() / n;
    let mean_obs = pairs.iter().map(|(_, o)| o).sum::<f64>() / n;

    let covariance: f64 = pairs
        .iter()
        .map(|(s, o)| (s - mean_sim) * (o - mean_obs))
        .sum();
    let var_sim: f64 = pairs.iter().map(|(s, _)| (s - mean_sim).powi(2)).sum();
    let var_obs: f64 = pairs.iter().map(|(_, o)| (o - mean_obs).powi(2)).sum();

    (covariance / (var_sim.sqrt() * var_obs.sqrt())).powi(2)
}

// Willmott's index of agreement d
pub fn index_of_agreement(simulated: &[f64], observed: &[f64]) -> f64 {
    let pairs = finite_pairs(simulated, observed);
    if pairs.is_empty() {
        return f64::NAN;
    }
    let mean_obs = pairs.iter().map(|(_, o)| o).sum::<f64>() / pairs.len() as f64;
    let sse: f64 = pairs.iter().map(|(s, o)| (s - o).powi(2)).sum();
    let potential: f64 = pairs
        .iter()
        .map(|(s, o)| ((s - mean_obs).abs() + (o - mean_obs).abs()).powi(2))
        .sum();
    1.0 - sse / potential
}

fn finite_pairs(simulated: &[f64], observed: &[f64]) -> Vec<(f64, f64)> {
    simulated
        .iter()
        .zip(observed)
        .filter(|(s, o)| s.is_finite() && o.is_finite())
        .map(|(&s, &o)| (s, o))
        .collect()
}

// Joins observed records to the disaggregated output on (site, time) and
// computes the metric set per site, sorted by site id
pub fn goodness_of_fit_by_site(
    observed: &[ObservedDischarge],
    predicted: &[DisaggregatedRow],
) -> Vec<SiteMetrics> {
    let mut predicted_lookup: HashMap<(i64, NaiveDate), f64> = HashMap::new();
    for row in predicted {
        predicted_lookup.insert((row.flowline_id, row.time), row.discharge);
    }

    let mut by_site: HashMap<i64, (Vec<f64>, Vec<f64>)> = HashMap::new();
    for record in observed {
        if let Some(&prediction) = predicted_lookup.get(&(record.site_id, record.time)) {
            let entry = by_site.entry(record.site_id).or_default();
            entry.0.push(prediction);
            entry.1.push(record.discharge);
        }
    }

    let mut metrics: Vec<SiteMetrics> = by_site
        .into_iter()
        .map(|(site_id, (simulated, obs))| SiteMetrics {
            site_id,
            pairs: finite_pairs(&simulated, &obs).len(),
            nse: nse(&simulated, &obs),
            rmse: rmse(&simulated, &obs),
            mae: mae(&simulated, &obs),
            r_squared: r_squared(&simulated, &obs),
            index_of_agreement: index_of_agreement(&simulated, &obs),
        })
        .collect();
    metrics.sort_by_key(|m| m.site_id);
    metrics
}
