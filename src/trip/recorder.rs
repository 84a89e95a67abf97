// src/trip/recorder.rs
//! The trip-recording state machine

use super::{
    clock::{ElapsedClock, Ticker},
    geo::DistanceAccumulator,
    inactivity::InactivityDetector,
    state::{PathSegment, StopReason, TrackingState, TripEvent, TripRecord, TripSnapshot},
    Signal,
};
use crate::{
    config::TrackerConfig,
    error::{Result, TripError},
    location::{AccuracyFilter, LocationProvider, LocationRequest, LocationSample, LocationSink},
    store::{LocationRecord, TripStore},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::{
    sync::{broadcast, mpsc, watch},
    time::Instant,
};

/// Owns all in-flight trip state.
///
/// Not thread-safe by itself: `TripService` is the single task that drives
/// it, and every mutation goes through that task. Methods must be called
/// inside a tokio runtime because the clock ticker and inactivity timer are
/// spawned tasks.
pub struct TripRecorder {
    config: TrackerConfig,
    state: TrackingState,
    trip: Option<TripRecord>,
    segments: Arc<Vec<PathSegment>>,
    filter: AccuracyFilter,
    distance: DistanceAccumulator,
    clock: ElapsedClock,
    ticker: Option<Ticker>,
    inactivity: InactivityDetector,
    speed_kmh: f64,
    ingesting: bool,
    provider: Arc<dyn LocationProvider>,
    store: Arc<dyn TripStore>,
    sink: LocationSink,
    signals: mpsc::UnboundedSender<Signal>,
    snapshots: watch::Sender<TripSnapshot>,
    events: broadcast::Sender<TripEvent>,
}

impl TripRecorder {
    pub(crate) fn new(
        config: TrackerConfig,
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn TripStore>,
        sink: LocationSink,
        signals: mpsc::UnboundedSender<Signal>,
        snapshots: watch::Sender<TripSnapshot>,
        events: broadcast::Sender<TripEvent>,
    ) -> Self {
        let inactivity = InactivityDetector::new(
            config.movement_threshold_meters,
            config.inactivity_timeout(),
            signals.clone(),
        );

        Self {
            filter: AccuracyFilter::new(config.accuracy_threshold_meters),
            config,
            state: TrackingState::Idle,
            trip: None,
            segments: Arc::new(Vec::new()),
            distance: DistanceAccumulator::new(),
            clock: ElapsedClock::new(),
            ticker: None,
            inactivity,
            speed_kmh: 0.0,
            ingesting: false,
            provider,
            store,
            sink,
            signals,
            snapshots,
            events,
        }
    }

    pub fn snapshot(&self) -> TripSnapshot {
        TripSnapshot {
            state: self.state,
            path_segments: Arc::clone(&self.segments),
            elapsed_millis: self.elapsed_millis(),
            distance_meters: self.distance.total_meters(),
            speed_kmh: self.speed_kmh,
        }
    }

    fn elapsed_millis(&self) -> u64 {
        let millis = self.clock.elapsed(Instant::now()).as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn emit(&self, event: TripEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Start a new trip, or resume a paused one
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            TrackingState::Running => return Ok(()),
            TrackingState::Idle | TrackingState::Paused => {}
        }

        if !self.provider.has_permission() {
            tracing::warn!("Location permission missing, not starting");
            return Err(TripError::PermissionDenied);
        }
        self.begin_ingestion()?;

        let now = Instant::now();
        let resuming = self.state == TrackingState::Paused;

        if resuming {
            let segments = Arc::make_mut(&mut self.segments);
            if segments.last().map_or(true, |s| !s.is_empty()) {
                segments.push(PathSegment::new());
            }
        } else {
            self.trip = Some(TripRecord::begin(Utc::now()));
            self.segments = Arc::new(vec![PathSegment::new()]);
            self.distance.reset();
            self.clock.reset();
            self.speed_kmh = 0.0;
        }

        self.clock.start(now);
        self.ticker = Some(Ticker::spawn(self.config.clock_tick(), self.signals.clone()));
        self.state = TrackingState::Running;

        if resuming {
            tracing::info!("Trip resumed");
            self.emit(TripEvent::Resumed);
        } else if let Some(start_time) = self.trip.as_ref().map(|t| t.start_time) {
            tracing::info!("Trip started at {}", start_time);
            self.emit(TripEvent::Started { start_time });
        }
        self.publish();
        Ok(())
    }

    fn begin_ingestion(&mut self) -> Result<()> {
        if !self.config.background_tracking_enabled {
            tracing::info!("Background tracking disabled, not requesting location updates");
            self.ingesting = false;
            return Ok(());
        }

        let request = LocationRequest::from_interval(self.config.location_update_interval());
        tracing::debug!("Requesting location updates every {:?}", request.interval);
        self.provider.request_updates(request, self.sink.clone())?;
        self.ingesting = true;
        Ok(())
    }

    fn end_ingestion(&mut self) {
        if self.ingesting {
            tracing::debug!("Stopping location updates");
            self.provider.remove_updates();
            self.ingesting = false;
        }
    }

    fn halt_clock(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.clock.pause(Instant::now());
    }

    pub fn pause(&mut self) {
        if self.state != TrackingState::Running {
            return;
        }

        self.end_ingestion();
        self.halt_clock();
        self.inactivity.reset();
        self.speed_kmh = 0.0;
        self.state = TrackingState::Paused;

        let elapsed = self.elapsed_millis();
        if let Some(trip) = self.trip.as_mut() {
            trip.duration_millis = elapsed;
        }

        tracing::info!("Trip paused after {} ms", elapsed);
        self.emit(TripEvent::Paused);
        self.publish();
    }

    /// Finish the current trip. Returns the finalized record, or `None` when
    /// no trip was active.
    pub fn stop(&mut self, reason: StopReason) -> Option<TripRecord> {
        if self.state == TrackingState::Idle {
            return None;
        }

        self.end_ingestion();
        self.halt_clock();
        self.inactivity.reset();

        let mut record = self.trip.take().unwrap_or_else(|| TripRecord::begin(Utc::now()));
        record.end_time = Some(Utc::now());
        record.distance_meters = self.distance.total_meters();
        record.duration_millis = self.elapsed_millis();

        let segments = std::mem::take(&mut self.segments);
        let points: Vec<(u32, LocationSample)> = segments
            .iter()
            .filter(|s| !s.is_empty())
            .enumerate()
            .flat_map(|(index, s)| {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                s.points().iter().map(move |p| (index, *p))
            })
            .collect();

        tracing::info!(
            "Trip stopped ({:?}): {:.0} m in {} ms, {} points",
            reason,
            record.distance_meters,
            record.duration_millis,
            points.len()
        );

        self.state = TrackingState::Idle;
        self.distance.reset();
        self.clock.reset();
        self.speed_kmh = 0.0;
        self.publish();

        self.emit(TripEvent::Stopped { record: record.clone(), reason });

        if points.is_empty() {
            tracing::info!("No accepted points, trip not saved");
            self.emit(TripEvent::Discarded);
        } else {
            self.persist(record.clone(), points);
        }

        Some(record)
    }

    /// Fire-and-forget save. Failures are reported, never retried.
    fn persist(&self, record: TripRecord, points: Vec<(u32, LocationSample)>) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        tokio::spawn(async move {
            let trip_id = match store.insert_trip(&record).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("Failed to save trip: {}", e);
                    let _ = events.send(TripEvent::SaveFailed { trip_id: None, message: e.to_string() });
                    return;
                }
            };

            let locations: Vec<LocationRecord> = points
                .iter()
                .map(|(segment, p)| LocationRecord::from_sample(trip_id, p).in_segment(*segment))
                .collect();

            match store.insert_locations(&locations).await {
                Ok(()) => {
                    tracing::info!("Trip {} saved with {} points", trip_id, locations.len());
                    let _ = events.send(TripEvent::Saved { trip_id });
                }
                Err(e) => {
                    tracing::error!("Failed to save points for trip {}: {}", trip_id, e);
                    let _ = events.send(TripEvent::SaveFailed {
                        trip_id: Some(trip_id),
                        message: e.to_string(),
                    });
                }
            }
        });
    }

    pub fn on_location(&mut self, sample: LocationSample) {
        if self.state != TrackingState::Running || !self.ingesting {
            return;
        }

        if !self.filter.accepts(&sample) {
            tracing::debug!(
                "Location accuracy too low: {:.1} m, skipping",
                sample.accuracy
            );
            return;
        }

        let segments = Arc::make_mut(&mut self.segments);
        if segments.is_empty() {
            segments.push(PathSegment::new());
        }
        let Some(segment) = segments.last_mut() else {
            return;
        };

        let previous = segment.last().copied();
        if !segment.push(sample) {
            tracing::debug!("Out-of-order fix at {}, skipping", sample.timestamp);
            return;
        }

        let total = self.distance.add(previous.as_ref(), &sample);
        self.speed_kmh = sample.speed_kmh();
        if let Some(trip) = self.trip.as_mut() {
            trip.distance_meters = total;
        }

        self.inactivity.observe(&sample);
        self.publish();
    }

    pub(crate) fn on_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Tick => self.tick(),
            Signal::InactivityTimeout(generation) => self.on_inactivity_timeout(generation),
        }
    }

    /// One clock poll: publish the new elapsed time while running
    pub fn tick(&mut self) {
        if self.state != TrackingState::Running {
            return;
        }
        let elapsed = self.elapsed_millis();
        if let Some(trip) = self.trip.as_mut() {
            trip.duration_millis = elapsed;
        }
        self.publish();
    }

    pub fn on_inactivity_timeout(&mut self, generation: u64) {
        if !self.inactivity.claim(generation) {
            tracing::debug!("Ignoring stale inactivity timeout {}", generation);
            return;
        }
        if self.state != TrackingState::Running {
            return;
        }
        tracing::info!(
            "No movement for {:?}, stopping trip",
            self.config.inactivity_timeout()
        );
        self.stop(StopReason::Inactivity);
    }

    /// Thresholds apply now; background tracking and the update interval
    /// apply from the next start or resume.
    pub fn apply_config(&mut self, config: TrackerConfig) {
        self.filter = AccuracyFilter::new(config.accuracy_threshold_meters);
        self.inactivity
            .set_thresholds(config.movement_threshold_meters, config.inactivity_timeout());
        self.config = config;
    }
}
