use crate::config::RunoffLevel;
use std::collections::HashMap;

// Anderson Level 1 runoff coefficients, grouped NLCD class codes
const LEVEL1_RUNOFF: &[(&[u16], f64)] = &[
    (&[21, 22, 23, 24], 0.875), // Urban
    (&[71, 81, 82], 0.4),       // Agriculture
    (&[41, 42, 43], 0.2),       // Forest
    (&[52], 0.175),             // Shrubland
    (&[31], 0.075),             // Barren
    (&[90, 95], 0.125),         // Wetland
    (&[11], 0.95),              // Open water
    (&[12], 0.90),              // Perennial ice/snow
];

// Anderson Level 2 runoff coefficients, one per NLCD class
const LEVEL2_RUNOFF: &[(u16, f64)] = &[
    (11, 0.95), // Open Water
    (12, 0.90), // Perennial Ice/Snow
    (21, 0.20), // Developed, Open Space
    (22, 0.50), // Developed, Low Intensity
    (23, 0.75), // Developed, Medium Intensity
    (24, 0.90), // Developed, High Intensity
    (31, 0.10), // Barren Land
    (41, 0.20), // Deciduous Forest
    (42, 0.25), // Evergreen Forest
    (43, 0.22), // Mixed Forest
    (52, 0.18), // Shrub/Scrub
    (71, 0.35), // Grassland/Herbaceous
    (81, 0.40), // Pasture/Hay
    (82, 0.45), // Cultivated Crops
    (90, 0.15), // Woody Wetlands
    (95, 0.10), // Emergent Herbaceous Wetlands
];

// One land-cover histogram bin for a flowline's divide, computed externally
// by zonal statistics over the classification raster
#[derive(Debug, Clone)]
pub struct LandCoverCount {
    pub flowline_id: i64,
    pub lc_code: u16,
    pub pixel_count: u64,
}

pub fn runoff_lookup(level: RunoffLevel) -> HashMap<u16, f64> {
    match level {
        RunoffLevel::Level1 => LEVEL1_RUNOFF
            .iter()
            .flat_map(|(codes, coeff)| codes.iter().map(move |&code| (code, *coeff)))
            .collect(),
        RunoffLevel::Level2 => LEVEL2_RUNOFF.iter().copied().collect(),
    }
}

// Pixel-count-weighted mean coefficient per flowline. Codes missing from
// the lookup are skipped; a flowline with no matched pixels gets no entry,
// which the scorer later reports as a missing runoff coefficient.
pub fn average_runoff_coefficients(
    counts: &[LandCoverCount],
    level: RunoffLevel,
) -> HashMap<i64, f64> {
    let lookup = runoff_lookup(level);
    let mut weighted: HashMap<i64, (f64, u64)> = HashMap::new();

    for count in counts {
        if let Some(&coeff) = lookup.get(&count.lc_code) {
            let entry = weighted.entry(count.flowline_id).or_insert((0.0, 0));
            entry.0 += count.pixel_count as f64 * coeff;
            entry.1 += count.pixel_count;
        }
    }

    weighted
        .into_iter()
        .filter(|(_, (_, pixels))| *pixels > 0)
        .map(|(flowline_id, (sum, pixels))| (flowline_id, sum / pixels as f64))
        .collect()
}
