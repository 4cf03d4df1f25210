use crate::config::ChannelGeometry;
use crate::network::FlowNetwork;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;

pub const SECONDS_PER_DAY: f64 = 86400.0;

// Intermediate hydraulic quantities, kept for the diagnostics table
#[derive(Debug, Clone)]
pub struct Hydraulics {
    pub hydraulic_radius: f64,
    pub velocity_mps: f64,
    pub segment_travel_time_s: f64,
    pub total_travel_time_s: f64,
    pub travel_time_days: i64,
}

// Manning's equation: v = (1/n) * R^(2/3) * S^(1/2)
pub fn manning_velocity(geometry: &ChannelGeometry) -> f64 {
    let radius = geometry.channel_area / geometry.wetted_perimeter;
    (1.0 / geometry.mannings_n) * radius.powf(2.0 / 3.0) * geometry.slope.sqrt()
}

// Per-flowline transit time from channel geometry, accumulated downstream
// to the outlet over the network and rounded into a whole-day lag
pub fn compute_travel_times(
    network: &FlowNetwork,
    geometries: &HashMap<i64, ChannelGeometry>,
) -> Result<HashMap<i64, Hydraulics>> {
    let mut segment_times = HashMap::with_capacity(network.len());
    let mut segment_hydraulics = HashMap::with_capacity(network.len());

    for flowline in network.flowlines() {
        let geometry = geometries.get(&flowline.flowline_id).with_context(|| {
            format!(
                "Missing Manning parameters for flowline {}",
                flowline.flowline_id
            )
        })?;
        validate_geometry(geometry, flowline.flowline_id)?;

        let radius = geometry.channel_area / geometry.wetted_perimeter;
        let velocity = manning_velocity(geometry);
        if !velocity.is_finite() || velocity <= 0.0 {
            bail!(
                "Channel velocity for flowline {} is {} m/s; check slope and roughness",
                flowline.flowline_id,
                velocity
            );
        }

        let segment_time = flowline.length_m / velocity;
        segment_times.insert(flowline.flowline_id, segment_time);
        segment_hydraulics.insert(flowline.flowline_id, (radius, velocity, segment_time));
    }

    let totals = network.accumulate_downstream(&segment_times)?;

    let mut hydraulics = HashMap::with_capacity(network.len());
    for (flowline_id, (radius, velocity, segment_time)) in segment_hydraulics {
        let total = totals
            .get(&flowline_id)
            .copied()
            .with_context(|| format!("No accumulated travel time for flowline {}", flowline_id))?;
        hydraulics.insert(
            flowline_id,
            Hydraulics {
                hydraulic_radius: radius,
                velocity_mps: velocity,
                segment_travel_time_s: segment_time,
                total_travel_time_s: total,
                travel_time_days: (total / SECONDS_PER_DAY).round() as i64,
            },
        );
    }

    Ok(hydraulics)
}

fn validate_geometry(geometry: &ChannelGeometry, flowline_id: i64) -> Result<()> {
    if !(geometry.slope > 0.0) || !geometry.slope.is_finite() {
        bail!(
            "Invalid slope {} for flowline {}; must be a positive number",
            geometry.slope,
            flowline_id
        );
    }
    if !(geometry.mannings_n > 0.0) || !geometry.mannings_n.is_finite() {
        bail!(
            "Invalid Manning's n {} for flowline {}; must be a positive number",
            geometry.mannings_n,
            flowline_id
        );
    }
    if !(geometry.channel_area > 0.0) || !geometry.channel_area.is_finite() {
        bail!(
            "Invalid channel area {} for flowline {}; must be a positive number",
            geometry.channel_area,
            flowline_id
        );
    }
    if !(geometry.wetted_perimeter > 0.0) || !geometry.wetted_perimeter.is_finite() {
        bail!(
            "Invalid wetted perimeter {} for flowline {}; must be a positive number",
            geometry.wetted_perimeter,
            flowline_id
        );
    }
    Ok(())
}
