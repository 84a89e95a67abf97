// src/display/terminal.rs
//! Terminal dashboard for a live trip

use crate::{
    error::Result,
    format::{format_distance_km, format_speed_kmh, format_stopwatch},
    trip::{TrackingState, TripSnapshot},
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::{sync::watch, time::MissedTickBehavior};

const DEFAULT_REFRESH: Duration = Duration::from_secs(1);

pub struct TripDashboard {
    refresh: Duration,
}

impl TripDashboard {
    pub fn new() -> Self {
        Self {
            refresh: DEFAULT_REFRESH,
        }
    }

    /// Draw to the terminal until `running` is cleared
    pub async fn run(
        &self,
        snapshots: watch::Receiver<TripSnapshot>,
        status: Arc<RwLock<String>>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        let result = self.run_to(&mut stdout, snapshots, status, running).await;

        execute!(stdout, Show, EnableLineWrap)?;
        println!();
        result
    }

    /// Redraw at most once per refresh period, and only when the snapshot or
    /// the status line changed since the last frame
    async fn run_to(
        &self,
        out: &mut impl Write,
        mut snapshots: watch::Receiver<TripSnapshot>,
        status: Arc<RwLock<String>>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut frames = tokio::time::interval(self.refresh);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_status: Option<String> = None;

        while running.load(Ordering::Relaxed) {
            frames.tick().await;
            if !running.load(Ordering::Relaxed) {
                break;
            }

            let message = status.read().map(|s| s.clone()).unwrap_or_default();
            // A closed channel keeps showing the last snapshot
            let snapshot_changed = snapshots.has_changed().unwrap_or(false);
            if !snapshot_changed && last_status.as_deref() == Some(message.as_str()) {
                continue;
            }

            let snapshot = snapshots.borrow_and_update().clone();
            execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
            self.render(out, &snapshot, &message)?;
            out.flush()?;
            last_status = Some(message);
        }

        Ok(())
    }

    pub fn render(&self, out: &mut impl Write, snapshot: &TripSnapshot, status: &str) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(48)),
            Print("\n"),
            Print("Trip Recorder"),
            Print("\n"),
            Print("=".repeat(48)),
            Print("\n"),
            ResetColor
        )?;

        let state_color = match snapshot.state {
            TrackingState::Running => Color::Green,
            TrackingState::Paused => Color::Yellow,
            TrackingState::Idle => Color::DarkGrey,
        };
        execute!(
            out,
            Print("  State:     "),
            SetForegroundColor(state_color),
            Print(format!("{}\n", snapshot.state)),
            ResetColor
        )?;

        execute!(
            out,
            Print(format!(
                "  Time:      {}\n",
                format_stopwatch(snapshot.elapsed_millis, false)
            )),
            Print(format!(
                "  Distance:  {}\n",
                format_distance_km(snapshot.distance_meters)
            )),
            Print(format!("  Speed:     {} km/h\n", format_speed_kmh(snapshot.speed_kmh))),
            Print(format!(
                "  Segments:  {} ({} points)\n\n",
                snapshot.path_segments.len(),
                snapshot.point_count()
            ))
        )?;

        self.render_last_fix(out, snapshot)?;

        if !status.is_empty() {
            execute!(
                out,
                SetForegroundColor(Color::Cyan),
                Print(format!("  {}\n\n", status)),
                ResetColor
            )?;
        }

        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(48)),
            Print("\n"),
            Print("s = start/resume  p = pause  x = stop  q = quit (then Enter)"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_last_fix(&self, out: &mut impl Write, snapshot: &TripSnapshot) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("LAST FIX:\n"),
            ResetColor
        )?;

        match snapshot.last_point() {
            Some(fix) => execute!(
                out,
                Print(format!("  Latitude:  {:>12.6}°\n", fix.latitude)),
                Print(format!("  Longitude: {:>12.6}°\n", fix.longitude)),
                Print(format!("  Accuracy:  {:>12.1} m\n", fix.accuracy)),
                Print(format!(
                    "  Received:  {}\n\n",
                    fix.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                ))
            )?,
            None => execute!(out, Print("  No fix yet\n\n"))?,
        }

        Ok(())
    }
}

impl Default for TripDashboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{location::LocationSample, trip::PathSegment};
    use chrono::{TimeZone, Utc};

    fn rendered(snapshot: &TripSnapshot, status: &str) -> String {
        let mut out = Vec::new();
        TripDashboard::new().render(&mut out, snapshot, status).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_idle_dashboard() {
        let text = rendered(&TripSnapshot::idle(), "");
        assert!(text.contains("Idle"));
        assert!(text.contains("00:00:00"));
        assert!(text.contains("0.0 km"));
        assert!(text.contains("No fix yet"));
    }

    #[test]
    fn test_running_dashboard_shows_last_fix() {
        let mut segment = PathSegment::new();
        segment.push(LocationSample::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            55.676098,
            12.568337,
            4.5,
            3.0,
        ));
        let snapshot = TripSnapshot {
            state: TrackingState::Running,
            path_segments: Arc::new(vec![segment]),
            elapsed_millis: 123_456,
            distance_meters: 1234.0,
            speed_kmh: 10.8,
        };

        let text = rendered(&snapshot, "Trip 2 saved");
        assert!(text.contains("Running"));
        assert!(text.contains("00:02:03"));
        assert!(text.contains("1.2 km"));
        assert!(text.contains("10.8 km/h"));
        assert!(text.contains("55.676098"));
        assert!(text.contains("1 (1 points)"));
        assert!(text.contains("Trip 2 saved"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_rate_limited() {
        let (tx, rx) = watch::channel(TripSnapshot::idle());
        let status = Arc::new(RwLock::new(String::new()));
        let running = Arc::new(AtomicBool::new(true));

        // Clock ticks change the snapshot every 50 ms for 3.5 s
        let flag = Arc::clone(&running);
        let feeder = tokio::spawn(async move {
            for tick in 1..=70u64 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tx.send_modify(|s| s.elapsed_millis = tick * 50);
            }
            flag.store(false, Ordering::Relaxed);
        });

        let mut out = Vec::new();
        TripDashboard::new()
            .run_to(&mut out, rx, status, running)
            .await
            .unwrap();
        feeder.await.unwrap();

        let frames = String::from_utf8(out).unwrap().matches("Trip Recorder").count();
        assert!((2..=4).contains(&frames), "drew {} frames", frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_state_is_not_redrawn() {
        let (_tx, rx) = watch::channel(TripSnapshot::idle());
        let status = Arc::new(RwLock::new(String::new()));
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let message = Arc::clone(&status);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5500)).await;
            if let Ok(mut status) = message.write() {
                *status = "Trip paused".to_string();
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            flag.store(false, Ordering::Relaxed);
        });

        let mut out = Vec::new();
        TripDashboard::new()
            .run_to(&mut out, rx, status, running)
            .await
            .unwrap();

        // The first frame, then one for the status change
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Trip Recorder").count(), 2);
        assert!(text.contains("Trip paused"));
    }
}
