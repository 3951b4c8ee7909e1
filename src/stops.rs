//! Static stop configuration: named, ordered lines of stops.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::geo::Coords;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stop {
    pub name: String,
    pub coords: Coords,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub name: String,
    pub stops: Vec<Stop>,
}

/// All lines known to the service. Read-only once loaded.
///
/// Serializes as `{"lineA": [...], "lineB": [...]}`, preserving line order.
#[derive(Debug, Clone, PartialEq)]
pub struct StopSet {
    lines: Vec<Line>,
}

#[derive(Debug, Deserialize)]
struct StopRow {
    line: String,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl StopSet {
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    /// Loads lines from a CSV file with the header `line,name,latitude,longitude`.
    pub fn from_csv(path: &Path) -> crate::Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
        Self::from_reader(file).with_context(|| format!("failed to load stops from `{}`", path.display()))
    }

    /// Rows are grouped by line in order of first appearance and keep their row order.
    pub fn from_reader<R: Read>(reader: R) -> crate::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut lines: Vec<Line> = Vec::new();
        for (index, result) in rdr.deserialize().enumerate() {
            let row: StopRow = result.with_context(|| format!("invalid stop row #{}", index + 1))?;
            let stop = Stop {
                name: row.name,
                coords: (row.latitude, row.longitude),
            };
            match lines.iter_mut().find(|line| line.name == row.line) {
                Some(line) => line.stops.push(stop),
                None => lines.push(Line {
                    name: row.line,
                    stops: vec![stop],
                }),
            }
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Every stop of every line, in line order.
    pub fn iter(&self) -> impl Iterator<Item = &Stop> {
        self.lines.iter().flat_map(|line| line.stops.iter())
    }
}

impl Default for StopSet {
    /// Ateneo campus e-jeep lines. Line A is a loop and ends where it starts.
    fn default() -> Self {
        fn stops(entries: &[(&str, f64, f64)]) -> Vec<Stop> {
            entries
                .iter()
                .map(|&(name, latitude, longitude)| Stop {
                    name: name.to_string(),
                    coords: (latitude, longitude),
                })
                .collect()
        }

        Self::new(vec![
            Line {
                name: "lineA".to_string(),
                stops: stops(&[
                    ("Gate 1 E-Jeep Station", 14.634644, 121.075036),
                    ("Gate 2.5 E-Jeep Station", 14.637709, 121.076327),
                    ("Old Rizal Library E-Jeep Station", 14.640339, 121.077142),
                    ("Xavier Hall E-Jeep Station", 14.640081, 121.078496),
                    ("Cervini Hall E-Jeep Station", 14.639123, 121.080127),
                    ("Old Comms Building E-Jeep Station", 14.636607, 121.078187),
                    ("Loyola House of Studies E-Jeep Station", 14.636365, 121.080766),
                    ("Gate 1 E-Jeep Station", 14.634644, 121.075036),
                ]),
            },
            Line {
                name: "lineB".to_string(),
                stops: stops(&[
                    ("Arete E-Jeep Station", 14.640693, 121.075704),
                    ("Ateneo Junior High School E-Jeep Station", 14.643922, 121.080637),
                    ("Ateneo Senior High School FLC E-Jeep Station", 14.646273, 121.080724),
                    ("Bellarmine Hall E-Jeep Station", 14.641497, 121.079714),
                    ("Social Development Complex E-Jeep Station", 14.641649, 121.077984),
                ]),
            },
        ])
    }
}

impl Serialize for StopSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.lines.len()))?;
        for line in &self.lines {
            map.serialize_entry(&line.name, &line.stops)?;
        }
        map.end()
    }
}
