//! Poll loop
//!
//! One cooperative task drives the whole pipeline:
//!
//! ```text
//! Idle -> Reading -> Decoding -> Detecting -> [Correlating -> Moving -> Persisting] -> Sleeping -> Reading ...
//!                                                                                            \-> Stopped
//! ```
//!
//! Failure isolation is per iteration. A failed read skips to `Sleeping`;
//! a failure while handling a detected unit is logged and the loop carries
//! on with the next poll. Inside the event branch each position is isolated
//! too, and the ledger row is written even when no image was found.
//!
//! Shutdown is cooperative through [`ShutdownFlag`], checked at the top of
//! every iteration and at every sleep step. An in-flight read is never
//! interrupted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::artifacts::ArtifactMover;
use crate::config::TraceConfig;
use crate::correlation::{settle::wait_until_settled, Correlator};
use crate::data::Ledger;
use crate::detector::{ChangeDetector, DetectionEvent};
use crate::error::TraceResult;
use crate::hardware::BlockTransport;
use crate::measurement::{decode_slice, Record, BLOCK_SIZE};

/// Cancellation token for the poll loop.
///
/// Clones share one flag; triggering any clone stops the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create an untriggered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once any clone was triggered.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trigger the flag on Ctrl+C or, on Unix, SIGTERM.
    ///
    /// The SIGTERM handler is installed before this returns. The task
    /// resolves to the name of the signal that fired.
    pub fn trigger_on_signals(&self) -> std::io::Result<JoinHandle<&'static str>> {
        #[cfg(unix)]
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        let flag = self.clone();
        Ok(tokio::spawn(async move {
            #[cfg(unix)]
            let name = tokio::select! {
                name = ctrl_c() => name,
                _ = terminate.recv() => "SIGTERM",
            };
            #[cfg(not(unix))]
            let name = ctrl_c().await;

            info!(signal = name, "Shutdown requested");
            flag.trigger();
            name
        }))
    }
}

async fn ctrl_c() -> &'static str {
    match signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending().await
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Created, not yet polled.
    Idle,
    /// Waiting on the transport.
    Reading,
    /// Turning raw bytes into a record.
    Decoding,
    /// Comparing the identifier with the last unit.
    Detecting,
    /// Looking for a matching image directory.
    Correlating,
    /// Transferring position images.
    Moving,
    /// Appending the ledger row.
    Persisting,
    /// Between polls.
    Sleeping,
    /// Shut down.
    Stopped,
}

/// Result of one [`PollScheduler::poll_once`] pass.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Transport fault or wrong block size; nothing else ran.
    ReadFailed,
    /// The station is empty.
    NoUnit,
    /// Same unit as the last event.
    Unchanged,
    /// A new unit was persisted.
    Recorded {
        /// Unit folder the row was written under.
        folder: PathBuf,
        /// Image files transferred over all positions.
        images: usize,
    },
    /// A new unit was detected but could not be persisted.
    EventFailed,
}

/// Counters over the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Calls to `poll_once`.
    pub iterations: u64,
    /// Failed reads and malformed blocks.
    pub read_failures: u64,
    /// Units with a ledger row.
    pub units_recorded: u64,
    /// Detected units that could not be persisted.
    pub event_failures: u64,
    /// Image files moved or copied.
    pub images_transferred: u64,
}

/// Loop parameters taken from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    /// Data block to read.
    pub db_number: u16,
    /// Time between the start of two sleeps.
    pub poll_interval: Duration,
    /// Shutdown check granularity while sleeping.
    pub sleep_step: Duration,
    /// Positions consulted for images, counted from 1
    pub positions: usize,
    /// Root scanned for image directories.
    pub source_dir: PathBuf,
    /// Zero disables the settle check
    pub settle: Duration,
    /// Upper bound on the settle wait.
    pub settle_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&TraceConfig::default())
    }
}

impl SchedulerSettings {
    /// Extract the loop parameters.
    pub fn from_config(config: &TraceConfig) -> Self {
        Self {
            db_number: config.controller.db_number,
            poll_interval: config.acquisition.poll_interval(),
            sleep_step: config.acquisition.sleep_step(),
            positions: config.acquisition.positions,
            source_dir: config.images.source_dir.clone(),
            settle: config.images.settle(),
            settle_timeout: config.images.settle_timeout(),
        }
    }
}

/// Drives read, detect, correlate, transfer and persist on a fixed cadence.
pub struct PollScheduler {
    transport: Box<dyn BlockTransport>,
    detector: ChangeDetector,
    correlator: Box<dyn Correlator>,
    mover: ArtifactMover,
    ledger: Ledger,
    settings: SchedulerSettings,
    state: PollState,
    stats: PollStats,
}

impl PollScheduler {
    /// Assemble a scheduler from explicit collaborators.
    pub fn new(
        transport: Box<dyn BlockTransport>,
        settings: SchedulerSettings,
        correlator: Box<dyn Correlator>,
        mover: ArtifactMover,
        ledger: Ledger,
    ) -> Self {
        Self {
            transport,
            detector: ChangeDetector::new(),
            correlator,
            mover,
            ledger,
            settings,
            state: PollState::Idle,
            stats: PollStats::default(),
        }
    }

    /// Wire every collaborator from the loaded configuration.
    pub fn from_config(transport: Box<dyn BlockTransport>, config: &TraceConfig) -> Self {
        Self::new(
            transport,
            SchedulerSettings::from_config(config),
            config.images.policy.correlator(config.images.max_delta_secs),
            ArtifactMover::new(config.images.transfer),
            Ledger::new(config.storage.base_dir.clone()),
        )
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Loop parameters.
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Identifier of the last unit that was detected.
    pub fn last_identifier(&self) -> Option<&str> {
        self.detector.last_identifier()
    }

    fn enter(&mut self, state: PollState) {
        trace!(from = ?self.state, to = ?state, "State transition");
        self.state = state;
    }

    /// Run until `shutdown` is triggered, then disconnect the transport once.
    pub async fn run(&mut self, shutdown: &ShutdownFlag) -> PollStats {
        info!(
            db_number = self.settings.db_number,
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            policy = %self.correlator.policy(),
            transfer = ?self.mover.mode(),
            source_dir = %self.settings.source_dir.display(),
            ledger = %self.ledger.base_dir().display(),
            "Poll loop started"
        );

        while !shutdown.is_triggered() {
            let outcome = self.poll_once().await;
            debug!(?outcome, "Iteration finished");
            self.enter(PollState::Sleeping);
            self.sleep(shutdown).await;
        }

        self.enter(PollState::Stopped);
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Failed to disconnect from controller");
        }
        info!(
            iterations = self.stats.iterations,
            units = self.stats.units_recorded,
            read_failures = self.stats.read_failures,
            event_failures = self.stats.event_failures,
            "Poll loop stopped"
        );
        self.stats
    }

    /// Sleep for the poll interval in `sleep_step` increments.
    async fn sleep(&self, shutdown: &ShutdownFlag) {
        let started = Instant::now();
        loop {
            if shutdown.is_triggered() {
                return;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.settings.poll_interval {
                return;
            }
            let remaining = self.settings.poll_interval - elapsed;
            tokio::time::sleep(remaining.min(self.settings.sleep_step)).await;
        }
    }

    /// One Reading to Detecting pass, plus the event branch on a new unit.
    pub async fn poll_once(&mut self) -> IterationOutcome {
        self.stats.iterations += 1;

        let record = match self.read_record().await {
            Ok(record) => record,
            Err(e) if e.is_transport() => {
                warn!(db_number = self.settings.db_number, error = %e, "Block read failed, skipping iteration");
                self.stats.read_failures += 1;
                return IterationOutcome::ReadFailed;
            }
            Err(e) => {
                error!(db_number = self.settings.db_number, error = %e, "Unexpected read error, skipping iteration");
                self.stats.read_failures += 1;
                return IterationOutcome::ReadFailed;
            }
        };

        self.enter(PollState::Detecting);
        if !record.has_unit() {
            return IterationOutcome::NoUnit;
        }
        let Some(event) = self.detector.observe(&record) else {
            return IterationOutcome::Unchanged;
        };

        let span = info_span!("unit", identifier = %event.identifier());
        match self.handle_event(&event).instrument(span).await {
            Ok((folder, images)) => {
                self.stats.units_recorded += 1;
                self.stats.images_transferred += images as u64;
                IterationOutcome::Recorded { folder, images }
            }
            Err(e) => {
                error!(identifier = %event.identifier(), error = %e, "Failed to record unit");
                self.stats.event_failures += 1;
                IterationOutcome::EventFailed
            }
        }
    }

    async fn read_record(&mut self) -> TraceResult<Record> {
        self.enter(PollState::Reading);
        let raw = self
            .transport
            .read_block(self.settings.db_number, 0, BLOCK_SIZE)
            .await?;

        self.enter(PollState::Decoding);
        decode_slice(&raw)
    }

    async fn handle_event(&mut self, event: &DetectionEvent) -> TraceResult<(PathBuf, usize)> {
        info!(
            previous = event.previous.as_deref().unwrap_or("-"),
            result_total = event.record.result_total,
            "New unit detected"
        );

        let now = chrono::Local::now().naive_local();
        let folder = self.ledger.prepare_folder(&event.record, now)?;
        let images = self.collect_images(&event.record, &folder).await;

        self.enter(PollState::Persisting);
        self.ledger.append(&event.record, now)?;
        info!(folder = %folder.display(), images, "Unit recorded");
        Ok((folder, images))
    }

    async fn collect_images(&mut self, record: &Record, folder: &Path) -> usize {
        let positions = 1..=self.settings.positions;

        if self.correlator.single_point() {
            let first = positions
                .clone()
                .find_map(|p| record.position(p)?.timestamp.map(|ts| (p, ts)));
            let Some((anchor, target)) = first else {
                warn!("No position timestamp present, recording without images");
                return 0;
            };
            let Some(source) = self.correlate(anchor, target).await else {
                return 0;
            };
            return positions.map(|p| self.transfer(&source, p, folder)).sum();
        }

        let mut total = 0;
        for position in positions {
            let Some(target) = record.position(position).and_then(|p| p.timestamp) else {
                debug!(position, "Position has no timestamp, skipping");
                continue;
            };
            if let Some(source) = self.correlate(position, target).await {
                total += self.transfer(&source, position, folder);
            }
        }
        total
    }

    async fn correlate(&mut self, position: usize, target: NaiveDateTime) -> Option<PathBuf> {
        self.enter(PollState::Correlating);
        let result = match self.correlator.find_match(target, &self.settings.source_dir) {
            Ok(result) => result,
            Err(e) => {
                warn!(position, target = %target, error = %e, "Correlation failed");
                return None;
            }
        };

        let Some(path) = result.path else {
            warn!(
                position,
                target = %target,
                policy = %result.policy,
                scanned = result.scanned,
                parsed = result.parsed,
                "No image directory matched"
            );
            return None;
        };

        if !self.settings.settle.is_zero() {
            match wait_until_settled(&path, self.settings.settle, self.settings.settle_timeout).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(position, path = %path.display(), "Transferring from a directory that is still changing");
                }
                Err(e) => {
                    warn!(position, path = %path.display(), error = %e, "Settle check failed");
                }
            }
        }
        Some(path)
    }

    fn transfer(&mut self, source: &Path, position: usize, folder: &Path) -> usize {
        self.enter(PollState::Moving);
        match self.mover.transfer(source, position, folder) {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    position,
                    source = %source.display(),
                    error = %e,
                    "Image transfer failed"
                );
                0
            }
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("settings", &self.settings)
            .field("policy", &self.correlator.policy())
            .field("mover", &self.mover)
            .field("ledger", &self.ledger)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}
