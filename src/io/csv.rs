use crate::config::ChannelGeometry;
use crate::disaggregate::{DisaggregatedRow, FlowlineCalc, OutletSeries};
use crate::landcover::LandCoverCount;
use crate::network::OUTLET_SENTINEL;
use crate::precip::PrecipRecord;
use crate::stats::ObservedDischarge;
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RunoffRow {
    flowline_id: i64,
    avg_runoff_coeff: f64,
}

#[derive(Debug, Deserialize)]
struct KsatRow {
    flowline_id: i64,
    ksat: f64,
}

#[derive(Debug, Deserialize)]
struct PrecipRow {
    time: String,
    flowline_id: i64,
    prcp: f64,
}

#[derive(Debug, Deserialize)]
struct OutletRow {
    time: String,
    discharge: f64,
}

#[derive(Debug, Deserialize)]
struct ManningRow {
    flowline_id: i64,
    slope: f64,
    mannings_n: f64,
    channel_area: f64,
    wetted_perimeter: f64,
}

#[derive(Debug, Deserialize)]
struct LandCoverRow {
    flowline_id: i64,
    lc_code: u16,
    pixel_count: u64,
}

#[derive(Debug, Deserialize)]
struct ObservedRow {
    site_id: i64,
    time: String,
    discharge: f64,
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

// Accepts bare dates and full timestamps; the series is daily either way
fn parse_day(raw: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    let datetime = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Unparseable time value '{}'", raw))?;
    Ok(datetime.date())
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Unparseable time value '{}'", raw))?;
    Ok(date.and_time(NaiveTime::MIN))
}

pub fn read_runoff_table(path: &Path) -> Result<HashMap<i64, f64>> {
    let mut reader = open_reader(path)?;
    let mut table = HashMap::new();
    for row in reader.deserialize() {
        let row: RunoffRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        if !row.avg_runoff_coeff.is_finite() || !(0.0..=1.0).contains(&row.avg_runoff_coeff) {
            bail!(
                "avg_runoff_coeff {} for flowline {} is outside [0, 1]",
                row.avg_runoff_coeff,
                row.flowline_id
            );
        }
        if table.insert(row.flowline_id, row.avg_runoff_coeff).is_some() {
            bail!("Duplicate flowline_id {} in {:?}", row.flowline_id, path);
        }
    }
    Ok(table)
}

pub fn read_ksat_table(path: &Path) -> Result<HashMap<i64, f64>> {
    let mut reader = open_reader(path)?;
    let mut table = HashMap::new();
    for row in reader.deserialize() {
        let row: KsatRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        if !row.ksat.is_finite() || row.ksat <= 0.0 {
            bail!(
                "ksat {} for flowline {} must be a positive number",
                row.ksat,
                row.flowline_id
            );
        }
        if table.insert(row.flowline_id, row.ksat).is_some() {
            bail!("Duplicate flowline_id {} in {:?}", row.flowline_id, path);
        }
    }
    Ok(table)
}

pub fn read_precip_records(path: &Path) -> Result<Vec<PrecipRecord>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: PrecipRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        if !row.prcp.is_finite() || row.prcp < 0.0 {
            bail!(
                "Invalid precipitation {} for flowline {}",
                row.prcp,
                row.flowline_id
            );
        }
        records.push(PrecipRecord {
            time: parse_timestamp(&row.time)?,
            flowline_id: row.flowline_id,
            prcp: row.prcp,
        });
    }
    Ok(records)
}

pub fn read_outlet_discharge(path: &Path) -> Result<OutletSeries> {
    let mut reader = open_reader(path)?;
    let mut pairs = Vec::new();
    for row in reader.deserialize() {
        let row: OutletRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        if !row.discharge.is_finite() || row.discharge < 0.0 {
            bail!("Invalid outlet discharge {} at {}", row.discharge, row.time);
        }
        pairs.push((parse_day(&row.time)?, row.discharge));
    }
    OutletSeries::new(pairs).with_context(|| format!("Bad outlet series in {:?}", path))
}

pub fn read_manning_params(path: &Path) -> Result<HashMap<i64, ChannelGeometry>> {
    let mut reader = open_reader(path)?;
    let mut table = HashMap::new();
    for row in reader.deserialize() {
        let row: ManningRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        let geometry = ChannelGeometry {
            slope: row.slope,
            mannings_n: row.mannings_n,
            channel_area: row.channel_area,
            wetted_perimeter: row.wetted_perimeter,
        };
        if table.insert(row.flowline_id, geometry).is_some() {
            bail!("Duplicate flowline_id {} in {:?}", row.flowline_id, path);
        }
    }
    Ok(table)
}

pub fn read_landcover_counts(path: &Path) -> Result<Vec<LandCoverCount>> {
    let mut reader = open_reader(path)?;
    let mut counts = Vec::new();
    for row in reader.deserialize() {
        let row: LandCoverRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        counts.push(LandCoverCount {
            flowline_id: row.flowline_id,
            lc_code: row.lc_code,
            pixel_count: row.pixel_count,
        });
    }
    Ok(counts)
}

pub fn read_observed_discharge(path: &Path) -> Result<Vec<ObservedDischarge>> {
    let mut reader = open_reader(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: ObservedRow = row.with_context(|| format!("Bad record in {:?}", path))?;
        records.push(ObservedDischarge {
            site_id: row.site_id,
            time: parse_day(&row.time)?,
            discharge: row.discharge,
        });
    }
    Ok(records)
}

pub fn write_disaggregated(path: &Path, rows: &[DisaggregatedRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    writer.write_record(["time", "flowline_id", "disaggregated_discharge"])?;
    for row in rows {
        writer.write_record(&[
            row.time.format("%Y-%m-%d").to_string(),
            row.flowline_id.to_string(),
            row.discharge.to_string(),
        ])?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn write_flowline_calcs(path: &Path, calcs: &[FlowlineCalc]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    writer.write_record([
        "flowline_id",
        "to_id",
        "length_m",
        "drainage_area",
        "area_incr",
        "influence_score",
        "runoff_weight",
        "hydraulic_radius",
        "velocity_mps",
        "segment_travel_time_s",
        "total_travel_time_s",
        "travel_time_days",
    ])?;

    for calc in calcs {
        let (radius, velocity, segment_s, total_s) = match &calc.hydraulics {
            Some(h) => (
                h.hydraulic_radius.to_string(),
                h.velocity_mps.to_string(),
                h.segment_travel_time_s.to_string(),
                h.total_travel_time_s.to_string(),
            ),
            None => Default::default(),
        };
        writer.write_record(&[
            calc.flowline_id.to_string(),
            calc.to_id.unwrap_or(OUTLET_SENTINEL).to_string(),
            calc.length_m.to_string(),
            calc.drainage_area.to_string(),
            calc.area_incr.to_string(),
            calc.influence_score.to_string(),
            calc.runoff_weight.to_string(),
            radius,
            velocity,
            segment_s,
            total_s,
            calc.travel_time_days().to_string(),
        ])?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(parse_day("2024-02-29").unwrap(), expected);
        assert_eq!(parse_day("2024-02-29 18:00:00").unwrap(), expected);
        assert!(parse_day("02/29/2024").is_err());
    }

    #[test]
    fn timestamp_parsing_fills_midnight_for_bare_dates() {
        let parsed = parse_timestamp("2024-02-29").unwrap();
        assert_eq!(parsed.time(), NaiveTime::MIN);
        assert_eq!(
            parse_timestamp("2024-02-29 06:30:00").unwrap().time(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
    }
}
