use crate::config::ColumnConfig;
use crate::network::{Flowline, OUTLET_SENTINEL};
use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::path::Path;

pub fn open_geopackage(path: &Path) -> Result<Connection> {
    Connection::open(path).with_context(|| format!("Failed to open GeoPackage: {:?}", path))
}

// Reads the flowlines layer. A GeoPackage is a SQLite container, so the
// attribute columns are queried directly; the geometry blob is not needed
// because planar length is carried in its own column.
pub fn load_flowlines(
    conn: &Connection,
    config: &ColumnConfig,
    layer: &str,
) -> Result<Vec<Flowline>> {
    let query = format!(
        "SELECT {}, {}, {}, {}, {} FROM '{}'",
        config.key, config.downstream, config.length, config.drainage_area, config.area_incr, layer
    );

    let mut stmt = conn
        .prepare(&query)
        .with_context(|| format!("Failed to query flowlines layer '{}'", layer))?;

    let rows = stmt.query_map([], |row| {
        Ok(Flowline {
            flowline_id: row.get::<_, i64>(0)?,
            to_id: row.get::<_, Option<i64>>(1)?,
            length_m: row.get::<_, f64>(2)?,
            drainage_area: row.get::<_, f64>(3)?,
            area_incr: row.get::<_, f64>(4)?,
        })
    })?;

    let mut flowlines = Vec::new();
    for row in rows {
        let mut flowline = row?;
        // NULL and -1 both mark the basin outlet in the source tables
        if flowline.to_id == Some(OUTLET_SENTINEL) {
            flowline.to_id = None;
        }
        check_non_negative(flowline.length_m, &config.length, flowline.flowline_id)?;
        check_non_negative(
            flowline.drainage_area,
            &config.drainage_area,
            flowline.flowline_id,
        )?;
        check_non_negative(flowline.area_incr, &config.area_incr, flowline.flowline_id)?;
        flowlines.push(flowline);
    }

    Ok(flowlines)
}

fn check_non_negative(value: f64, field: &str, flowline_id: i64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("Invalid {} {} for flowline {}", field, value, flowline_id);
    }
    Ok(())
}
