use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};

// Sentinel downstream id marking the basin outlet in the source tables
pub const OUTLET_SENTINEL: i64 = -1;

// A single reach of the river network, directed toward its downstream neighbor
#[derive(Debug, Clone)]
pub struct Flowline {
    pub flowline_id: i64,
    pub to_id: Option<i64>,
    pub length_m: f64,
    pub drainage_area: f64,
    pub area_incr: f64,
}

// Flow network topology over the flowline_id -> to_id relation
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    flowlines: Vec<Flowline>,
    index: HashMap<i64, usize>,
}

impl FlowNetwork {
    // Builds the network from the loaded flowline table. Downstream
    // references that leave the loaded domain are demoted to outlets;
    // duplicate ids and cycles are rejected.
    pub fn new(mut flowlines: Vec<Flowline>) -> Result<Self> {
        if flowlines.is_empty() {
            bail!("Flowlines table is empty");
        }

        let mut ids = HashSet::with_capacity(flowlines.len());
        for flowline in &flowlines {
            if !ids.insert(flowline.flowline_id) {
                bail!(
                    "Duplicate flowline_id {} in flowlines table",
                    flowline.flowline_id
                );
            }
        }

        for flowline in &mut flowlines {
            if let Some(downstream) = flowline.to_id {
                if !ids.contains(&downstream) {
                    println!(
                        "flowline {} flows to {} which is outside the domain",
                        flowline.flowline_id, downstream
                    );
                    flowline.to_id = None;
                }
            }
        }

        let index = flowlines
            .iter()
            .enumerate()
            .map(|(position, flowline)| (flowline.flowline_id, position))
            .collect();

        let network = FlowNetwork { flowlines, index };
        network.validate_topology()?;
        Ok(network)
    }

    pub fn len(&self) -> usize {
        self.flowlines.len()
    }

    pub fn flowlines(&self) -> &[Flowline] {
        &self.flowlines
    }

    pub fn get(&self, flowline_id: i64) -> Option<&Flowline> {
        self.index.get(&flowline_id).map(|&i| &self.flowlines[i])
    }

    pub fn downstream_of(&self, flowline_id: i64) -> Option<i64> {
        self.get(flowline_id).and_then(|flowline| flowline.to_id)
    }

    pub fn outlet_count(&self) -> usize {
        self.flowlines.iter().filter(|f| f.to_id.is_none()).count()
    }

    // Every downstream walk must reach an outlet without revisiting a node
    pub fn validate_topology(&self) -> Result<()> {
        let zeros: HashMap<i64, f64> = self
            .flowlines
            .iter()
            .map(|f| (f.flowline_id, 0.0))
            .collect();
        self.accumulate_downstream(&zeros).map(|_| ())
    }

    // Sums per-segment values downstream to the outlet for every flowline.
    // Iterative walk with an on-path guard instead of recursion; totals are
    // memoized so a downstream path shared by many flowlines is walked once.
    pub fn accumulate_downstream(
        &self,
        segment_values: &HashMap<i64, f64>,
    ) -> Result<HashMap<i64, f64>> {
        let mut totals: HashMap<i64, f64> = HashMap::with_capacity(self.flowlines.len());

        for flowline in &self.flowlines {
            if totals.contains_key(&flowline.flowline_id) {
                continue;
            }

            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            let mut current = flowline.flowline_id;

            // Walk downstream until the outlet or an already-resolved reach
            let mut running_total = loop {
                if let Some(&total) = totals.get(&current) {
                    break total;
                }
                if !on_path.insert(current) {
                    bail!("Cycle detected in flow network at flowline {}", current);
                }
                path.push(current);
                match self.downstream_of(current) {
                    Some(next) => current = next,
                    None => break 0.0,
                }
            };

            // Unwind the path, accumulating from the outlet upward
            for &flowline_id in path.iter().rev() {
                running_total += segment_values.get(&flowline_id).copied().unwrap_or(0.0);
                totals.insert(flowline_id, running_total);
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flowline(flowline_id: i64, to_id: Option<i64>) -> Flowline {
        Flowline {
            flowline_id,
            to_id,
            length_m: 100.0,
            drainage_area: 1.0,
            area_incr: 1.0,
        }
    }

    #[test]
    fn chain_accumulates_segment_values_to_the_outlet() {
        let network = FlowNetwork::new(vec![
            flowline(1, Some(2)),
            flowline(2, Some(3)),
            flowline(3, None),
        ])
        .unwrap();

        let segments = HashMap::from([(1, 10.0), (2, 20.0), (3, 30.0)]);
        let totals = network.accumulate_downstream(&segments).unwrap();

        assert_relative_eq!(totals[&1], 60.0);
        assert_relative_eq!(totals[&2], 50.0);
        assert_relative_eq!(totals[&3], 30.0);
    }

    #[test]
    fn confluence_shares_the_downstream_path() {
        let network = FlowNetwork::new(vec![
            flowline(1, Some(3)),
            flowline(2, Some(3)),
            flowline(3, None),
        ])
        .unwrap();

        let segments = HashMap::from([(1, 5.0), (2, 7.0), (3, 11.0)]);
        let totals = network.accumulate_downstream(&segments).unwrap();

        assert_relative_eq!(totals[&1], 16.0);
        assert_relative_eq!(totals[&2], 18.0);
        assert_relative_eq!(totals[&3], 11.0);
    }

    #[test]
    fn cycle_is_rejected_at_construction() {
        let result = FlowNetwork::new(vec![flowline(1, Some(2)), flowline(2, Some(1))]);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("Cycle detected"), "got: {}", message);
    }

    #[test]
    fn self_loop_is_rejected() {
        let result = FlowNetwork::new(vec![flowline(1, Some(1))]);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_domain_downstream_becomes_an_outlet() {
        let network = FlowNetwork::new(vec![flowline(1, Some(99))]).unwrap();
        assert_eq!(network.downstream_of(1), None);
        assert_eq!(network.outlet_count(), 1);
    }

    #[test]
    fn duplicate_flowline_id_is_rejected() {
        let result = FlowNetwork::new(vec![flowline(1, None), flowline(1, None)]);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("Duplicate flowline_id 1"), "got: {}", message);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(FlowNetwork::new(Vec::new()).is_err());
    }

    #[test]
    fn missing_segment_values_count_as_zero() {
        let network =
            FlowNetwork::new(vec![flowline(1, Some(2)), flowline(2, None)]).unwrap();
        let totals = network.accumulate_downstream(&HashMap::new()).unwrap();
        assert_relative_eq!(totals[&1], 0.0);
        assert_relative_eq!(totals[&2], 0.0);
    }
}
