use crate::config::{AreaBasis, EPSILON};
use crate::network::FlowNetwork;
use std::collections::HashMap;

// One row of the joined scoring table. Missing joins stay None so the
// scorer can report them instead of arithmetic on NaN.
#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub flowline_id: i64,
    pub area: Option<f64>,
    pub runoff_coeff: Option<f64>,
    pub prcp_sum: Option<f64>,
    pub ksat: Option<f64>,
}

// Left-joins the runoff, precipitation, and Ksat tables onto the network
// flowlines, keyed on flowline_id, in network table order
pub fn build_attribute_table(
    network: &FlowNetwork,
    runoff: &HashMap<i64, f64>,
    prcp_sums: &HashMap<i64, f64>,
    ksat: &HashMap<i64, f64>,
    area_basis: AreaBasis,
) -> Vec<AttributeRecord> {
    network
        .flowlines()
        .iter()
        .map(|flowline| {
            let area = match area_basis {
                AreaBasis::Cumulative => flowline.drainage_area,
                AreaBasis::Incremental => flowline.area_incr,
            };
            AttributeRecord {
                flowline_id: flowline.flowline_id,
                area: Some(area),
                runoff_coeff: runoff.get(&flowline.flowline_id).copied(),
                prcp_sum: prcp_sums.get(&flowline.flowline_id).copied(),
                ksat: ksat.get(&flowline.flowline_id).copied(),
            }
        })
        .collect()
}

// Min-max rescale of ksat, precipitation, and area to the 1-10 range.
// Each column is scaled independently; undefined entries are left alone.
pub fn scale_inputs(records: &mut [AttributeRecord]) {
    scale_column(records, |r| &mut r.ksat);
    scale_column(records, |r| &mut r.prcp_sum);
    scale_column(records, |r| &mut r.area);
}

fn scale_column<F>(records: &mut [AttributeRecord], field: F)
where
    F: Fn(&mut AttributeRecord) -> &mut Option<f64>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for record in records.iter_mut() {
        if let Some(value) = *field(record) {
            min = min.min(value);
            max = max.max(value);
        }
    }
    if !min.is_finite() {
        // column is entirely undefined
        return;
    }

    for record in records.iter_mut() {
        if let Some(value) = field(record).as_mut() {
            *value = 1.0 + (*value - min) * 9.0 / (max - min + EPSILON);
        }
    }
}
