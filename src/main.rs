use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;

mod attributes;
mod cli;
mod config;
mod disaggregate;
mod io;
mod landcover;
mod network;
mod precip;
mod scoring;
mod stats;
mod travel_time;

use attributes::{build_attribute_table, scale_inputs};
use cli::{Args, get_args, resolve};
use config::{ChannelGeometry, ColumnConfig, DisaggregationParams};
use disaggregate::{FlowlineCalc, disaggregate};
use network::FlowNetwork;
use scoring::score_influence;
use travel_time::compute_travel_times;

fn main() -> Result<()> {
    let (args, gpkg_path, params) = get_args()?;

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to configure the worker thread pool")?;

    let column_config = ColumnConfig::new();

    // Build network topology
    println!("Building flow network topology...");
    let conn = io::gpkg::open_geopackage(&gpkg_path)?;
    let flowlines = io::gpkg::load_flowlines(&conn, &column_config, &args.flowlines_layer)?;
    let network = FlowNetwork::new(flowlines)?;
    println!("Network topology built with {} flowlines", network.len());
    println!("Found {} outlet flowlines", network.outlet_count());

    // Load attribute tables
    println!("Loading attribute tables...");
    let ksat = io::csv::read_ksat_table(&resolve(&args.data_dir, &args.ksat_file))?;

    let mut precip_records =
        io::csv::read_precip_records(&resolve(&args.data_dir, &args.precipitation_file))?;
    precip::normalize_daily(&mut precip_records);
    let prcp_sums = precip::aggregate_by_flowline(&precip_records);
    println!(
        "Aggregated {} precipitation records onto {} flowlines",
        precip_records.len(),
        prcp_sums.len()
    );

    let runoff = load_runoff_coefficients(&args, &params)?;
    let outlet =
        io::csv::read_outlet_discharge(&resolve(&args.data_dir, &args.outlet_discharge_file))?;

    // Joined scoring table
    let mut attribute_table =
        build_attribute_table(&network, &runoff, &prcp_sums, &ksat, params.area_basis);
    if params.scale_inputs {
        scale_inputs(&mut attribute_table);
    }
    let scored = score_influence(&attribute_table, &params)?;

    // Travel-time lags
    let hydraulics = if params.use_travel_time_dilation {
        let geometries = load_channel_geometries(&args, &network)?;
        Some(compute_travel_times(&network, &geometries)?)
    } else {
        None
    };

    // The attribute table and scores are both in network order, so the
    // diagnostics rows zip cleanly with the flowlines
    let calcs: Vec<FlowlineCalc> = network
        .flowlines()
        .iter()
        .zip(&scored)
        .map(|(flowline, score)| FlowlineCalc {
            flowline_id: score.flowline_id,
            to_id: flowline.to_id,
            length_m: flowline.length_m,
            drainage_area: flowline.drainage_area,
            area_incr: flowline.area_incr,
            influence_score: score.influence_score,
            runoff_weight: score.runoff_weight,
            hydraulics: hydraulics
                .as_ref()
                .and_then(|map| map.get(&flowline.flowline_id).cloned()),
        })
        .collect();

    let label = params.label();
    println!("\nDisaggregation Configuration:");
    println!("  Label: {}", label);
    println!("  Flowlines: {}", network.len());
    println!("  Outlet series length: {} days", outlet.len());
    println!("  Worker threads: {}", threads);

    let progress = ProgressBar::new(calcs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} flowlines ({eta})",
            )?
            .progress_chars("#>-"),
    );

    println!("\nStarting disaggregation...");
    let rows = disaggregate(&calcs, &outlet, &progress);
    progress.finish_and_clear();

    let disagg_path = args
        .data_dir
        .join(format!("disaggregated_discharge_{}.csv", label));
    let calcs_path = args
        .data_dir
        .join(format!("flowline_calculations_{}.csv", label));
    io::csv::write_disaggregated(&disagg_path, &rows)?;
    io::csv::write_flowline_calcs(&calcs_path, &calcs)?;
    println!("Saved disaggregated discharge to {:?}", disagg_path);
    println!("Saved flowline calculations to {:?}", calcs_path);

    if let Some(observed_file) = &args.observed_file {
        let observed = io::csv::read_observed_discharge(&resolve(&args.data_dir, observed_file))?;
        report_goodness_of_fit(&observed, &rows);
    }

    println!("\nDisaggregation complete.");
    Ok(())
}

fn load_runoff_coefficients(
    args: &Args,
    params: &DisaggregationParams,
) -> Result<HashMap<i64, f64>> {
    match (&args.runoff_file, &args.landcover_file) {
        (Some(_), Some(_)) => bail!("Pass either --runoff-file or --landcover-file, not both"),
        (Some(path), None) => io::csv::read_runoff_table(&resolve(&args.data_dir, path)),
        (None, Some(path)) => {
            let counts = io::csv::read_landcover_counts(&resolve(&args.data_dir, path))?;
            Ok(landcover::average_runoff_coefficients(
                &counts,
                params.runoff_level,
            ))
        }
        (None, None) => {
            // conventional file names in the data directory
            let landcover_default = args.data_dir.join("landcover_counts.csv");
            let runoff_default = args.data_dir.join("runoff_coefficients.csv");
            if landcover_default.exists() {
                let counts = io::csv::read_landcover_counts(&landcover_default)?;
                Ok(landcover::average_runoff_coefficients(
                    &counts,
                    params.runoff_level,
                ))
            } else if runoff_default.exists() {
                io::csv::read_runoff_table(&runoff_default)
            } else {
                bail!(
                    "No runoff source found: pass --landcover-file or --runoff-file, \
                     or place landcover_counts.csv / runoff_coefficients.csv in {:?}",
                    args.data_dir
                )
            }
        }
    }
}

fn load_channel_geometries(
    args: &Args,
    network: &FlowNetwork,
) -> Result<HashMap<i64, ChannelGeometry>> {
    let manning_path: Option<PathBuf> = match &args.manning_file {
        Some(path) => Some(resolve(&args.data_dir, path)),
        None => {
            let default_path = args.data_dir.join("manning_parameters.csv");
            default_path.exists().then_some(default_path)
        }
    };

    match manning_path {
        Some(path) => {
            println!("Loading Manning parameters...");
            io::csv::read_manning_params(&path)
        }
        None => {
            println!(
                "Optional Manning parameter table not found; using placeholder channel geometry"
            );
            let placeholder = ChannelGeometry::placeholder();
            Ok(network
                .flowlines()
                .iter()
                .map(|f| (f.flowline_id, placeholder.clone()))
                .collect())
        }
    }
}

fn report_goodness_of_fit(
    observed: &[stats::ObservedDischarge],
    predicted: &[disaggregate::DisaggregatedRow],
) {
    let metrics = stats::goodness_of_fit_by_site(observed, predicted);
    if metrics.is_empty() {
        println!("\nNo overlapping (site, time) pairs for goodness-of-fit evaluation");
        return;
    }

    println!("\nGoodness-of-fit by site:");
    println!(
        "{:>12} {:>7} {:>8} {:>10} {:>10} {:>8} {:>8}",
        "site_id", "pairs", "NSE", "RMSE", "MAE", "R2", "d"
    );
    for m in &metrics {
        println!(
            "{:>12} {:>7} {:>8.3} {:>10.3} {:>10.3} {:>8.3} {:>8.3}",
            m.site_id, m.pairs, m.nse, m.rmse, m.mae, m.r_squared, m.index_of_agreement
        );
    }
}
