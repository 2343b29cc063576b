use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::fuser::{self, TrajectoryPoint};

/// File extension of exported flights.
pub const EXTENSION: &str = "flight";

/// Everything recorded about one flight: who flew it, the fused raw
/// trajectory and the analytics derived from it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    #[serde(default)]
    pub pilot_name: String,
    #[serde(default)]
    pub instructor_name: String,
    #[serde(default, rename = "flightInstr")]
    pub flight_instructions: String,
    #[serde(default)]
    pub flight_date: String,
    #[serde(default)]
    pub flight_length: f64,

    /// Raw fused trajectory, gaps included
    pub coords: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub legal_points: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub velocities: Vec<f64>,

    #[serde(default)]
    pub avg_vel: f64,
    #[serde(default)]
    pub min_vel: f64,
    #[serde(default)]
    pub max_vel: f64,
    #[serde(default)]
    pub smoothness: f64,
}

impl FlightRecord {
    /// New record over a fused trajectory; the length is the time of its
    /// last point.
    pub fn from_trajectory(coords: Vec<TrajectoryPoint>) -> Self {
        Self {
            flight_length: fuser::flight_length(&coords),
            coords,
            ..Default::default()
        }
    }

    pub fn pilot<S: Into<String>>(mut self, name: S) -> Self {
        self.pilot_name = name.into();
        self
    }

    pub fn instructor<S: Into<String>>(mut self, name: S) -> Self {
        self.instructor_name = name.into();
        self
    }

    pub fn instructions<S: Into<String>>(mut self, text: S) -> Self {
        self.flight_instructions = text.into();
        self
    }

    pub fn date<S: Into<String>>(mut self, date: S) -> Self {
        self.flight_date = date.into();
        self
    }

    /// Pretty JSON, four space indent.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(writer, formatter);

        serde::Serialize::serialize(self, &mut ser)?;

        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);

        self.write_to(&mut writer)?;
        writer.flush()?;

        info!(path = %path.display(), points = self.coords.len(), "flight exported");

        Ok(())
    }

    pub fn import<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let record = Self::read_from(BufReader::new(File::open(path)?))?;

        info!(path = %path.display(), points = record.coords.len(), "flight imported");

        Ok(record)
    }
}
