use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use log::info;
use serde_derive::Serialize;

use crate::aggregate::{VehicleCounts, VehicleRecord};
use crate::detection::TrackId;
use crate::error::Error;

#[derive(Serialize, Debug, PartialEq)]
struct ReportRow {
    #[serde(rename = "Vehicle_ID")]
    id: TrackId,
    #[serde(rename = "Vehicle_Type")]
    vehicle_type: Option<&'static str>,
    #[serde(rename = "Max_Speed_kmh")]
    max_speed: u32,
    #[serde(rename = "Frame_Count")]
    frame_count: u64,
    #[serde(rename = "First_Seen_Frame")]
    first_seen: Option<u64>,
    #[serde(rename = "Last_Seen_Frame")]
    last_seen: Option<u64>,
}

impl ReportRow {
    fn new(id: TrackId, record: &VehicleRecord) -> Self {
        Self {
            id,
            vehicle_type: record.vehicle_type.map(|c| c.name()),
            max_speed: record.max_speed,
            frame_count: record.frame_count,
            first_seen: record.first_seen,
            last_seen: record.last_seen,
        }
    }
}

/// End-of-run state handed to the report writer.
#[derive(Debug, Clone)]
pub struct Summary {
    pub frames: u64,
    pub counts: VehicleCounts,
    pub records: BTreeMap<TrackId, VehicleRecord>,
}

impl Summary {
    /// Number of distinct identities seen during the run.
    #[inline]
    pub fn unique_vehicles(&self) -> usize {
        self.records.len()
    }

    /// Writes one CSV row per identity, ascending by identity, header first.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), Error> {
        let mut wtr = csv::Writer::from_writer(writer);

        if self.records.is_empty() {
            wtr.write_record([
                "Vehicle_ID",
                "Vehicle_Type",
                "Max_Speed_kmh",
                "Frame_Count",
                "First_Seen_Frame",
                "Last_Seen_Frame",
            ])?;
        }

        for (id, record) in &self.records {
            wtr.serialize(ReportRow::new(*id, record))?;
        }

        wtr.flush()?;

        Ok(())
    }

    pub fn write_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        info!("Exporting tracking data to {}...", path.display());

        let file = File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }

    pub fn log(&self) {
        info!("TRACKING SUMMARY");
        info!("Frames processed: {}", self.frames);
        info!("Total unique vehicles tracked: {}", self.unique_vehicles());
        info!("Vehicle counts by type:");
        for (class, count) in self.counts.iter() {
            info!("  - {}: {}", class, count);
        }
    }
}
