//! CSV input and output addressed by configurable column names.

use crate::deterrence::DeterrenceFunction;
use crate::errors::{RGDMError, RGDMResult};
use crate::flows::FlowTable;
use crate::friction::{FrictionRecord, FrictionTable};
use crate::sectors::SectorTotals;
use crate::zone::{Zone, ZoneTotals};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::debug;

/// Production and attraction columns of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorColumns {
    pub name: String,
    pub origin_total_col: String,
    pub dest_total_col: String,
}

/// Column names of the zone totals table.
///
/// Either give a single `origin_total_col`/`dest_total_col` pair (read as the
/// sector `"total"`) or a list of `sectors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneColumns {
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_total_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_total_col: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sectors: Vec<SectorColumns>,
}

impl ZoneColumns {
    pub fn single(zone_id: &str, origin_total_col: &str, dest_total_col: &str) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            origin_total_col: Some(origin_total_col.to_string()),
            dest_total_col: Some(dest_total_col.to_string()),
            sectors: Vec::new(),
        }
    }

    /// The sectors to read, checking that the configuration is complete.
    pub fn sector_columns(&self) -> RGDMResult<Vec<SectorColumns>> {
        match (&self.origin_total_col, &self.dest_total_col) {
            (None, None) if !self.sectors.is_empty() => Ok(self.sectors.clone()),
            (None, None) => Err(RGDMError::MissingOption("origin_total_col".to_string())),
            (Some(_), Some(_)) if !self.sectors.is_empty() => Err(RGDMError::invalid_parameter(
                "sectors",
                "give either origin_total_col/dest_total_col or sectors, not both",
            )),
            (Some(o), Some(d)) => Ok(vec![SectorColumns {
                name: "total".to_string(),
                origin_total_col: o.clone(),
                dest_total_col: d.clone(),
            }]),
            (None, Some(_)) => Err(RGDMError::MissingOption("origin_total_col".to_string())),
            (Some(_), None) => Err(RGDMError::MissingOption("dest_total_col".to_string())),
        }
    }
}

/// Column names of the friction (skim) table.
///
/// Friction is read from `friction_value_col` when set, otherwise it is
/// derived from `travel_time_col` through a deterrence function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionColumns {
    pub friction_origin_col: String,
    pub friction_dest_col: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction_value_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_flow_col: Option<String>,
}

impl FrictionColumns {
    pub fn new(friction_origin_col: &str, friction_dest_col: &str) -> Self {
        Self {
            friction_origin_col: friction_origin_col.to_string(),
            friction_dest_col: friction_dest_col.to_string(),
            friction_value_col: None,
            travel_time_col: None,
            observed_flow_col: None,
        }
    }

    /// Calibration needs both an observed flow and a travel time column.
    pub fn ensure_observed(&self) -> RGDMResult<()> {
        if self.observed_flow_col.is_none() {
            return Err(RGDMError::MissingOption("observed_flow_col".to_string()));
        }
        if self.travel_time_col.is_none() {
            return Err(RGDMError::MissingOption("travel_time_col".to_string()));
        }
        Ok(())
    }
}

fn column_index(headers: &StringRecord, column: &str, table: &str) -> RGDMResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| RGDMError::MissingColumn {
            column: column.to_string(),
            table: table.to_string(),
        })
}

fn optional_index(
    headers: &StringRecord,
    column: Option<&String>,
    table: &str,
) -> RGDMResult<Option<usize>> {
    column.map(|c| column_index(headers, c, table)).transpose()
}

fn field<'r>(record: &'r StringRecord, index: usize, line: u64) -> RGDMResult<&'r str> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| RGDMError::InvalidValue {
            field: format!("column {}", index),
            value: "missing".to_string(),
            context: format!("line {}", line),
        })
}

fn parse_number(record: &StringRecord, index: usize, column: &str, line: u64) -> RGDMResult<f64> {
    let raw = field(record, index, line)?;
    raw.parse::<f64>().map_err(|_| RGDMError::InvalidValue {
        field: column.to_string(),
        value: raw.to_string(),
        context: format!("line {}", line),
    })
}

/// Empty cells read as `None`.
fn parse_optional(
    record: &StringRecord,
    index: Option<usize>,
    column: Option<&String>,
    line: u64,
) -> RGDMResult<Option<f64>> {
    match (index, column) {
        (Some(index), Some(column)) => {
            if field(record, index, line)?.is_empty() {
                Ok(None)
            } else {
                parse_number(record, index, column, line).map(Some)
            }
        }
        _ => Ok(None),
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Read zone totals for every configured sector.
pub fn read_zone_totals<R: Read>(reader: R, columns: &ZoneColumns) -> RGDMResult<SectorTotals> {
    let sector_columns = columns.sector_columns()?;
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let id_index = column_index(&headers, &columns.zone_id, "zone")?;
    let indices = sector_columns
        .iter()
        .map(|s| -> RGDMResult<(usize, usize)> {
            Ok((
                column_index(&headers, &s.origin_total_col, "zone")?,
                column_index(&headers, &s.dest_total_col, "zone")?,
            ))
        })
        .collect::<RGDMResult<Vec<(usize, usize)>>>()?;

    let mut zones: Vec<Vec<Zone>> = vec![Vec::new(); sector_columns.len()];
    for result in rdr.records() {
        let record = result?;
        let line = line_of(&record);
        let id = field(&record, id_index, line)?;
        for ((sector, (o_index, d_index)), sector_zones) in
            sector_columns.iter().zip(&indices).zip(zones.iter_mut())
        {
            let production = parse_number(&record, *o_index, &sector.origin_total_col, line)?;
            let attraction = parse_number(&record, *d_index, &sector.dest_total_col, line)?;
            sector_zones.push(Zone::new(id, production, attraction));
        }
    }

    let mut sectors = SectorTotals::new();
    for (sector, zones) in sector_columns.into_iter().zip(zones) {
        debug!(sector = %sector.name, zones = zones.len(), "read zone totals");
        sectors.insert(sector.name, ZoneTotals::new(zones)?)?;
    }
    Ok(sectors)
}

/// Read a friction table.
///
/// `deterrence` is required when friction is derived from travel time.
pub fn read_friction_table<R: Read>(
    reader: R,
    columns: &FrictionColumns,
    deterrence: Option<&dyn DeterrenceFunction>,
) -> RGDMResult<FrictionTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let origin_index = column_index(&headers, &columns.friction_origin_col, "friction")?;
    let dest_index = column_index(&headers, &columns.friction_dest_col, "friction")?;
    let friction_index = optional_index(&headers, columns.friction_value_col.as_ref(), "friction")?;
    let time_index = optional_index(&headers, columns.travel_time_col.as_ref(), "friction")?;
    let flow_index = optional_index(&headers, columns.observed_flow_col.as_ref(), "friction")?;

    if friction_index.is_none() {
        if time_index.is_none() {
            return Err(RGDMError::MissingOption("friction_value_col".to_string()));
        }
        if deterrence.is_none() {
            return Err(RGDMError::MissingOption("deterrence".to_string()));
        }
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = line_of(&record);
        let travel_time =
            parse_optional(&record, time_index, columns.travel_time_col.as_ref(), line)?;
        let observed_flow =
            parse_optional(&record, flow_index, columns.observed_flow_col.as_ref(), line)?;

        let friction = match (friction_index, &columns.friction_value_col) {
            (Some(index), Some(column)) => parse_number(&record, index, column, line)?,
            _ => {
                let t = travel_time.ok_or_else(|| RGDMError::InvalidValue {
                    field: columns.travel_time_col.clone().unwrap_or_default(),
                    value: "missing".to_string(),
                    context: format!("line {}", line),
                })?;
                deterrence.map(|d| d.evaluate(t)).unwrap_or(0.0)
            }
        };

        records.push(FrictionRecord {
            origin: field(&record, origin_index, line)?.into(),
            destination: field(&record, dest_index, line)?.into(),
            friction,
            travel_time,
            observed_flow,
        });
    }

    debug!(records = records.len(), "read friction table");
    FrictionTable::new(records)
}

/// Write flows as `origin,destination,flow` CSV.
pub fn write_flows<W: Write>(writer: W, flows: &FlowTable) -> RGDMResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["origin", "destination", "flow"])?;
    for r in flows.iter() {
        wtr.write_record([
            r.origin.as_str(),
            r.destination.as_str(),
            r.flow.to_string().as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
