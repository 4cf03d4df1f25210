use crate::config::{AreaBasis, DisaggregationParams, RunoffLevel};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Disaggregate an observed outlet discharge record across a flowline network
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding the input tables and receiving the outputs
    pub data_dir: PathBuf,

    /// GeoPackage with the flowlines layer (default: first .gpkg in the data directory)
    #[arg(long)]
    pub gpkg: Option<PathBuf>,

    /// Flowlines layer name inside the GeoPackage
    #[arg(long, default_value = "flowlines")]
    pub flowlines_layer: String,

    /// CSV of per-flowline runoff coefficients (flowline_id, avg_runoff_coeff)
    #[arg(long)]
    pub runoff_file: Option<PathBuf>,

    /// CSV of per-flowline land-cover pixel counts (flowline_id, lc_code, pixel_count)
    #[arg(long)]
    pub landcover_file: Option<PathBuf>,

    /// CSV of raw precipitation records (time, flowline_id, prcp)
    #[arg(long, default_value = "precipitation.csv")]
    pub precipitation_file: PathBuf,

    /// CSV of per-flowline saturated hydraulic conductivity (flowline_id, ksat)
    #[arg(long, default_value = "ksat.csv")]
    pub ksat_file: PathBuf,

    /// CSV of the observed outlet discharge series (time, discharge)
    #[arg(long, default_value = "daily_discharge.csv")]
    pub outlet_discharge_file: PathBuf,

    /// Optional CSV of Manning parameters
    /// (flowline_id, slope, mannings_n, channel_area, wetted_perimeter)
    #[arg(long)]
    pub manning_file: Option<PathBuf>,

    /// Optional CSV of observed per-site discharge (site_id, time, discharge)
    /// for a goodness-of-fit report
    #[arg(long)]
    pub observed_file: Option<PathBuf>,

    /// Exponent for the area term
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Exponent for the runoff coefficient term
    #[arg(long, default_value_t = 1.0)]
    pub beta: f64,

    /// Exponent for the precipitation term
    #[arg(long, default_value_t = 1.0)]
    pub gamma: f64,

    /// Exponent for the hydraulic conductivity term
    #[arg(long, default_value_t = 1.0)]
    pub omega: f64,

    /// Use Level 2 (detailed) land-cover runoff coefficients instead of Level 1
    #[arg(long)]
    pub level2_runoff: bool,

    /// Score with incremental divide area instead of cumulative drainage area
    #[arg(long)]
    pub incremental_area: bool,

    /// Disable the travel-time lag and disaggregate with zero shift
    #[arg(long)]
    pub no_travel_time: bool,

    /// Skip rescaling ksat, precipitation, and area to the 1-10 range
    #[arg(long)]
    pub no_scale_inputs: bool,

    /// Worker threads for the disaggregation loop (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

pub fn get_args() -> Result<(Args, PathBuf, DisaggregationParams)> {
    let args = Args::parse();

    let gpkg_path = match &args.gpkg {
        Some(path) => resolve(&args.data_dir, path),
        None => find_gpkg(&args.data_dir)?,
    };

    let params = DisaggregationParams {
        alpha: args.alpha,
        beta: args.beta,
        gamma: args.gamma,
        omega: args.omega,
        runoff_level: if args.level2_runoff {
            RunoffLevel::Level2
        } else {
            RunoffLevel::Level1
        },
        area_basis: if args.incremental_area {
            AreaBasis::Incremental
        } else {
            AreaBasis::Cumulative
        },
        use_travel_time_dilation: !args.no_travel_time,
        scale_inputs: !args.no_scale_inputs,
    };

    Ok((args, gpkg_path, params))
}

// File arguments are taken relative to the data directory unless absolute
pub fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

fn find_gpkg(data_dir: &Path) -> Result<PathBuf> {
    let entries = data_dir
        .read_dir()
        .with_context(|| format!("Failed to read data directory: {:?}", data_dir))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "gpkg") {
            return Ok(path);
        }
    }
    bail!(
        "No .gpkg file found in {:?}; pass one with --gpkg",
        data_dir
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_into_the_data_directory() {
        let resolved = resolve(Path::new("/data"), Path::new("ksat.csv"));
        assert_eq!(resolved, PathBuf::from("/data/ksat.csv"));
    }

    #[test]
    fn absolute_paths_are_left_alone() {
        let resolved = resolve(Path::new("/data"), Path::new("/elsewhere/ksat.csv"));
        assert_eq!(resolved, PathBuf::from("/elsewhere/ksat.csv"));
    }
}
