// src/format.rs
//! Human-readable formatting of trip values

/// Format an elapsed duration as `HH:MM:SS`, or `HH:MM:SS:CC` with centiseconds
pub fn format_stopwatch(millis: u64, include_centis: bool) -> String {
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;

    if include_centis {
        let centis = (millis % 1000) / 10;
        format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, centis)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

pub fn format_distance_km(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.0)
}

pub fn format_speed_kmh(kmh: f64) -> String {
    format!("{:.1}", kmh)
}
