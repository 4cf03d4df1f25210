// Configuration structure for column name mapping in the GeoPackage layer
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub key: String,
    pub downstream: String,
    pub length: String,
    pub drainage_area: String,
    pub area_incr: String,
}

impl ColumnConfig {
    pub fn new() -> Self {
        ColumnConfig {
            key: "flowline_id".to_string(),
            downstream: "to_id".to_string(),
            length: "length_m".to_string(),
            drainage_area: "drainage_area".to_string(),
            area_incr: "area_incr".to_string(),
        }
    }
}

// Epsilon guard shared by the scoring and scaling formulas
pub const EPSILON: f64 = 1e-9;

// Which land-cover classification level the runoff coefficients come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunoffLevel {
    Level1,
    Level2,
}

// Which area column feeds the influence score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaBasis {
    Cumulative,
    Incremental,
}

// Exponents and mode switches for the disaggregation run
#[derive(Debug, Clone)]
pub struct DisaggregationParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub omega: f64,
    pub runoff_level: RunoffLevel,
    pub area_basis: AreaBasis,
    pub use_travel_time_dilation: bool,
    pub scale_inputs: bool,
}

impl DisaggregationParams {
    // Short tag describing which terms were active, used in output filenames
    pub fn label(&self) -> String {
        let mut tokens: Vec<&str> = Vec::new();
        if self.alpha != 0.0 {
            tokens.push("A");
        }
        if self.beta != 0.0 {
            tokens.push(match self.runoff_level {
                RunoffLevel::Level1 => "RC_L1",
                RunoffLevel::Level2 => "RC_L2",
            });
        }
        if self.gamma != 0.0 {
            tokens.push("P");
        }
        if self.omega != 0.0 {
            tokens.push("K");
        }
        if self.use_travel_time_dilation {
            tokens.push("TT");
        }
        tokens.join("_")
    }
}

// Channel geometry for Manning's equation
#[derive(Debug, Clone)]
pub struct ChannelGeometry {
    pub slope: f64,
    pub mannings_n: f64,
    pub channel_area: f64,
    pub wetted_perimeter: f64,
}

impl ChannelGeometry {
    // Placeholder geometry applied when no Manning table is supplied.
    // A rough basin-wide approximation, not calibrated per reach.
    pub fn placeholder() -> Self {
        ChannelGeometry {
            slope: 0.01,
            mannings_n: 0.02,
            channel_area: 10.0,
            wetted_perimeter: 9.0,
        }
    }
}
