// src/export.rs
//! Trip history export

use crate::error::{Result, TripError};
use crate::format::format_stopwatch;
use crate::store::LocationRecord;
use crate::trip::TripRecord;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
        }
    }

    /// `trips_<YYYYmmdd_HHMMSS>.<ext>`
    pub fn default_file_name(&self, at: DateTime<Utc>) -> String {
        format!("trips_{}.{}", at.format("%Y%m%d_%H%M%S"), self.extension())
    }
}

pub struct TripExporter {
    trips: Vec<TripRecord>,
}

impl TripExporter {
    pub fn new(trips: Vec<TripRecord>) -> Self {
        Self { trips }
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        if self.trips.is_empty() {
            return Err(TripError::Other("No trips to export".to_string()));
        }

        let content = self.render(format)?;
        write_file(path, &content)?;

        tracing::info!(
            "Exported {} trips as {} to {}",
            self.trips.len(),
            format.display_name(),
            path.display()
        );
        Ok(())
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Json => self.to_json(),
        }
    }

    pub fn to_csv(&self) -> String {
        let mut csv =
            String::from("id,start_time,end_time,distance_meters,duration_millis,duration\n");

        for trip in &self.trips {
            csv.push_str(&format!(
                "{},{},{},{:.2},{},{}\n",
                trip.id,
                trip.start_time.to_rfc3339(),
                trip.end_time.map_or(String::new(), |t| t.to_rfc3339()),
                trip.distance_meters,
                trip.duration_millis,
                format_stopwatch(trip.duration_millis, false)
            ));
        }

        csv
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.trips)?)
    }
}

/// Render one trip's stored points as a GPX 1.1 track
pub fn track_to_gpx(trip: &TripRecord, locations: &[LocationRecord]) -> String {
    let mut gpx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Trip Recorder" xmlns="http://www.topografix.com/GPX/1/1">
"#,
    );

    gpx.push_str(&format!(
        "  <metadata>\n    <time>{}</time>\n  </metadata>\n",
        trip.start_time.to_rfc3339()
    ));
    gpx.push_str("  <trk>\n");
    gpx.push_str(&format!(
        "    <name>{}</name>\n",
        escape_xml(&format!("Trip {}", trip.id))
    ));

    // One <trkseg> per recording interval
    let mut current_segment = None;
    for point in locations {
        if current_segment != Some(point.segment) {
            if current_segment.is_some() {
                gpx.push_str("    </trkseg>\n");
            }
            gpx.push_str("    <trkseg>\n");
            current_segment = Some(point.segment);
        }
        gpx.push_str(&format!(
            "      <trkpt lat=\"{}\" lon=\"{}\">\n        <time>{}</time>\n        <extensions><speed>{}</speed></extensions>\n      </trkpt>\n",
            point.latitude,
            point.longitude,
            point.timestamp.to_rfc3339(),
            point.speed
        ));
    }

    if current_segment.is_some() {
        gpx.push_str("    </trkseg>\n");
    }
    gpx.push_str("  </trk>\n</gpx>\n");
    gpx
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationSample;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn finished_trip() -> TripRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        TripRecord {
            id: 3,
            start_time: start,
            end_time: Some(start + Duration::seconds(789)),
            distance_meters: 2345.678,
            duration_millis: 789_012,
        }
    }

    #[test]
    fn test_csv_export() {
        let csv = TripExporter::new(vec![finished_trip()]).to_csv();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "id,start_time,end_time,distance_meters,duration_millis,duration"
        );
        assert_eq!(
            lines[1],
            "3,2024-05-01T08:00:00+00:00,2024-05-01T08:13:09+00:00,2345.68,789012,00:13:09"
        );
    }

    #[test]
    fn test_csv_unfinished_trip_has_empty_end() {
        let mut trip = finished_trip();
        trip.end_time = None;
        let csv = TripExporter::new(vec![trip]).to_csv();
        assert!(csv.contains("+00:00,,2345.68"));
    }

    #[test]
    fn test_json_export_is_array_of_records() {
        let json = TripExporter::new(vec![finished_trip()]).to_json().unwrap();
        let parsed: Vec<TripRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![finished_trip()]);
    }

    #[test]
    fn test_empty_export_is_an_error() {
        let dir = tempdir().unwrap();
        let exporter = TripExporter::new(Vec::new());
        assert!(exporter
            .export_to_file(&dir.path().join("out.csv"), ExportFormat::Csv)
            .is_err());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exports").join("trips.json");

        TripExporter::new(vec![finished_trip()])
            .export_to_file(&path, ExportFormat::Json)
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"distance_meters\": 2345.678"));
    }

    #[test]
    fn test_default_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            ExportFormat::Csv.default_file_name(at),
            "trips_20240102_030405.csv"
        );
        assert_eq!(
            ExportFormat::Json.default_file_name(at),
            "trips_20240102_030405.json"
        );
    }

    #[test]
    fn test_gpx_track() {
        let trip = finished_trip();
        let points: Vec<_> = (0..2)
            .map(|i| {
                let sample = LocationSample::new(
                    trip.start_time + Duration::seconds(i),
                    42.0 + i as f64,
                    -71.0,
                    5.0,
                    1.0,
                );
                LocationRecord::from_sample(trip.id, &sample)
            })
            .collect();

        let gpx = track_to_gpx(&trip, &points);
        assert!(gpx.contains("<gpx"));
        assert!(gpx.contains("<name>Trip 3</name>"));
        assert!(gpx.contains("lat=\"42\" lon=\"-71\""));
        assert!(gpx.contains("lat=\"43\" lon=\"-71\""));
        assert_eq!(gpx.matches("<trkpt").count(), 2);
        assert_eq!(gpx.matches("<trkseg>").count(), 1);
    }

    #[test]
    fn test_gpx_keeps_segments_apart() {
        let trip = finished_trip();
        let points: Vec<_> = [(0, 0), (0, 1), (1, 60), (1, 61), (2, 90)]
            .iter()
            .map(|&(segment, offset)| {
                let sample = LocationSample::new(
                    trip.start_time + Duration::seconds(offset),
                    42.0 + offset as f64 * 0.001,
                    -71.0,
                    5.0,
                    1.0,
                );
                LocationRecord::from_sample(trip.id, &sample).in_segment(segment)
            })
            .collect();

        let gpx = track_to_gpx(&trip, &points);
        assert_eq!(gpx.matches("<trkseg>").count(), 3);
        assert_eq!(gpx.matches("</trkseg>").count(), 3);
        assert_eq!(gpx.matches("<trkpt").count(), 5);
    }

    #[test]
    fn test_gpx_without_points_has_no_segment() {
        let gpx = track_to_gpx(&finished_trip(), &[]);
        assert!(!gpx.contains("<trkseg>"));
        assert!(gpx.contains("</trk>"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
