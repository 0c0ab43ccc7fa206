//! Scan cycles: scan, ingest, sweep, persist.
//!
//! [`ScanOrchestrator`] runs a single cycle or a cancellable loop of them.
//! [`ScanController`] is the handle display code holds: it triggers one-off
//! scans, toggles the continuous loop on a background thread, and forwards
//! labeling and reset requests.
//!
//! # Cycle
//!
//! ```text
//!  ScanProvider::scan ──▶ registry.ingest(now) ──▶ registry.sweep(now) ──▶ publish ──▶ save
//!        │
//!        └── ScanError: registry untouched, cycle skipped
//! ```
//!
//! The registry lock is only taken inside ingest, sweep and snapshot. The
//! scan itself runs unlocked.

use crate::activity::{ActivityLog, SharedActivityLog};
use crate::config::ScanSettings;
use crate::core::{DeviceView, RegistryError, SharedClock, SharedRegistry, SystemClock};
use crate::scanner::{ScanError, ScanProvider};
use crate::store::{PersistenceError, PersistenceStore};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one successful cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The batch timestamp used for ingest and sweep
    pub now: i64,
    pub observations: usize,
    pub discovered: usize,
    pub exited: usize,
    pub present: usize,
    pub absent: usize,
}

/// Why a cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// The scan failed; nothing was ingested.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The registry was updated in memory but could not be saved.
    #[error(transparent)]
    Persist(#[from] PersistenceError),
}

/// Errors from operator commands (label, reset).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Persist(#[from] PersistenceError),
}

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = bounded(1);
    (StopHandle { tx }, StopSignal { rx })
}

/// Requests that a continuous loop stop after its current cycle.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Observed by a continuous loop between cycles.
///
/// Dropping every [`StopHandle`] also counts as a stop request.
#[derive(Debug)]
pub struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// Check for a stop request without blocking.
    pub fn is_stopped(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep for up to `timeout`, waking early on a stop request.
    /// Returns true if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

/// Runs scan cycles against a shared registry.
pub struct ScanOrchestrator {
    provider: Arc<dyn ScanProvider>,
    registry: SharedRegistry,
    store: PersistenceStore,
    settings: ScanSettings,
    clock: SharedClock,
    activity: SharedActivityLog,
    subscribers: Mutex<Vec<Sender<Vec<DeviceView>>>>,
    /// Serializes saves so the file always holds the latest copy taken.
    save_lock: Mutex<()>,
}

impl ScanOrchestrator {
    pub fn new(
        provider: Arc<dyn ScanProvider>,
        registry: SharedRegistry,
        store: PersistenceStore,
        settings: ScanSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            settings,
            clock: Arc::new(SystemClock),
            activity: Arc::new(ActivityLog::new()),
            subscribers: Mutex::new(Vec::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Record activity into an existing log.
    pub fn with_activity(mut self, activity: SharedActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn activity(&self) -> &SharedActivityLog {
        &self.activity
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Receive the registry snapshot after every completed cycle.
    ///
    /// An observer that has not taken the previous snapshot skips newer ones
    /// until it catches up; scanning never waits on display.
    pub fn subscribe(&self) -> Receiver<Vec<DeviceView>> {
        let (tx, rx) = bounded(1);
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Run one scan, ingest, sweep, publish and save.
    ///
    /// A scan failure leaves the registry untouched. A save failure is
    /// returned after the in-memory registry has already been updated.
    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let observations = match self.provider.scan(self.settings.scan_duration()) {
            Ok(observations) => observations,
            Err(e) => {
                self.activity.record_scan_failure();
                return Err(e.into());
            }
        };

        let now = self.clock.now();
        let ingest = self.registry.ingest(&observations, now);
        let exited = self
            .registry
            .sweep(now, self.settings.exit_threshold_secs());
        let (present, absent) = self.registry.counts();

        self.activity.record_cycle(
            ingest.ingested() as u64,
            ingest.created as u64,
            exited as u64,
        );

        let report = CycleReport {
            now,
            observations: ingest.ingested(),
            discovered: ingest.created,
            exited,
            present,
            absent,
        };

        self.publish(now);

        if let Err(e) = self.save() {
            self.activity.record_save_failure();
            return Err(e.into());
        }

        info!(
            scanner = self.provider.name(),
            observations = report.observations,
            discovered = report.discovered,
            exited = report.exited,
            present = report.present,
            absent = report.absent,
            "Scan cycle complete"
        );

        Ok(report)
    }

    /// Run cycles back to back until `stop` fires. Returns the number of cycles run.
    ///
    /// Failed cycles are logged and the loop carries on. A stop request is
    /// only honoured between cycles.
    pub fn run_continuous(&self, stop: &StopSignal) -> u64 {
        let mut cycles = 0;

        while !stop.is_stopped() {
            match self.run_cycle() {
                Ok(_) => {}
                Err(CycleError::Scan(e)) => warn!("Scan failed, skipping cycle: {e}"),
                Err(CycleError::Persist(e)) => warn!("Could not save registry: {e}"),
            }
            cycles += 1;

            if stop.wait(self.settings.scan_interval()) {
                break;
            }
        }

        info!("Continuous scanning stopped after {cycles} cycles");
        cycles
    }

    /// Write the current registry to the store.
    pub fn save(&self) -> Result<(), PersistenceError> {
        let _guard = lock(&self.save_lock);
        let snapshot = self.registry.records();
        self.store.save(&snapshot)
    }

    /// Display views as of now.
    pub fn snapshot(&self) -> Vec<DeviceView> {
        self.registry.snapshot(self.clock.now())
    }

    /// Label a device by address or tag and save. Returns the address labelled.
    ///
    /// Nothing is written when the device is unknown.
    pub fn label(&self, address_or_tag: &str, label: &str) -> Result<String, CommandError> {
        let address = self
            .registry
            .resolve(address_or_tag)
            .ok_or_else(|| RegistryError::NotFound(address_or_tag.to_string()))?;
        self.registry.label(&address, label)?;
        self.save()?;
        Ok(address)
    }

    /// Drop every record, zero the activity counters and save both.
    pub fn reset(&self) -> Result<usize, PersistenceError> {
        let dropped = self.registry.reset();
        self.activity.reset();
        if let Err(e) = self.activity.save() {
            warn!("Could not save activity stats: {e}");
        }
        self.save()?;
        info!("Registry reset, {dropped} devices removed");
        Ok(dropped)
    }

    fn publish(&self, now: i64) {
        let mut subscribers = lock(&self.subscribers);
        if subscribers.is_empty() {
            return;
        }

        let views = self.registry.snapshot(now);
        subscribers.retain(|tx| match tx.try_send(views.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Observer busy, snapshot skipped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// Lock a mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Presentation-side handle: one-off scans and the continuous loop toggle.
pub struct ScanController {
    orchestrator: Arc<ScanOrchestrator>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    stop: StopHandle,
    handle: JoinHandle<u64>,
}

impl ScanController {
    pub fn new(orchestrator: Arc<ScanOrchestrator>) -> Self {
        Self {
            orchestrator,
            worker: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
        &self.orchestrator
    }

    /// Run a single cycle on the calling thread.
    ///
    /// Safe while the continuous loop runs; the two only meet at the
    /// registry lock.
    pub fn trigger_scan(&self) -> Result<CycleReport, CycleError> {
        self.orchestrator.run_cycle()
    }

    /// Start or stop the background loop.
    ///
    /// Stopping waits for the cycle in progress to finish.
    pub fn set_continuous(&self, enabled: bool) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);

        if enabled {
            if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
                return Ok(());
            }
            if let Some(finished) = worker.take() {
                let _ = finished.handle.join();
            }

            let (stop, signal) = stop_channel();
            let orchestrator = Arc::clone(&self.orchestrator);
            let handle = thread::Builder::new()
                .name("tagwatch-scan".to_string())
                .spawn(move || orchestrator.run_continuous(&signal))?;
            *worker = Some(Worker { stop, handle });
            info!("Continuous scanning enabled");
        } else if let Some(running) = worker.take() {
            running.stop.stop();
            if running.handle.join().is_err() {
                warn!("Scan thread panicked");
            }
            info!("Continuous scanning disabled");
        }

        Ok(())
    }

    pub fn is_continuous(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn snapshot(&self) -> Vec<DeviceView> {
        self.orchestrator.snapshot()
    }

    pub fn label(&self, address_or_tag: &str, label: &str) -> Result<String, CommandError> {
        self.orchestrator.label(address_or_tag, label)
    }

    pub fn reset(&self) -> Result<usize, PersistenceError> {
        self.orchestrator.reset()
    }

    /// Stop the background loop, if any.
    pub fn shutdown(&self) {
        // Stopping never spawns, so this cannot fail.
        let _ = self.set_continuous(false);
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, PresenceRegistry, PresenceState};
    use crate::scanner::Observation;
    use crate::store::CorruptStatePolicy;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Announces each scan on `entered`, then holds it until `release` fires.
    struct GatedScanner {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl ScanProvider for GatedScanner {
        fn scan(&self, _duration: Duration) -> Result<Vec<Observation>, ScanError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(vec![Observation::new("CC:DD")])
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    /// Replays queued scan results, then reports nothing.
    #[derive(Default)]
    struct ScriptedScanner {
        script: Mutex<VecDeque<Result<Vec<Observation>, ScanError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedScanner {
        fn push_ok(&self, observations: Vec<Observation>) {
            lock(&self.script).push_back(Ok(observations));
        }

        fn push_err(&self, message: &str) {
            lock(&self.script).push_back(Err(ScanError::Failed(message.to_string())));
        }
    }

    impl ScanProvider for ScriptedScanner {
        fn scan(&self, _duration: Duration) -> Result<Vec<Observation>, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.script).pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        scanner: Arc<ScriptedScanner>,
        clock: Arc<ManualClock>,
        orchestrator: Arc<ScanOrchestrator>,
    }

    fn settings(interval: Duration) -> ScanSettings {
        ScanSettings::new(Duration::from_secs(4), interval, Duration::from_secs(30)).unwrap()
    }

    fn fixture(interval: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Arc::new(ScriptedScanner::default());
        let clock = Arc::new(ManualClock::new(1000));
        let store =
            PersistenceStore::new(dir.path().join("devices.json"), CorruptStatePolicy::Fail);
        let orchestrator = ScanOrchestrator::new(
            scanner.clone(),
            Arc::new(PresenceRegistry::default()),
            store,
            settings(interval),
        )
        .with_clock(clock.clone());

        Fixture {
            _dir: dir,
            scanner,
            clock,
            orchestrator: Arc::new(orchestrator),
        }
    }

    fn phone() -> Observation {
        Observation::new("AA:BB").with_name("Phone1").with_signal(-60)
    }

    #[test]
    fn test_cycle_ingests_sweeps_and_saves() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone()]);

        let report = f.orchestrator.run_cycle().unwrap();
        assert_eq!(report.now, 1000);
        assert_eq!(report.discovered, 1);
        assert_eq!(report.present, 1);

        let saved = f.orchestrator.store().load().unwrap();
        assert_eq!(saved, f.orchestrator.registry().records());
    }

    #[test]
    fn test_failed_scan_leaves_registry_untouched() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone()]);
        f.orchestrator.run_cycle().unwrap();
        let before = f.orchestrator.registry().records();

        f.clock.advance(100);
        f.scanner.push_err("adapter powered off");
        assert!(matches!(f.orchestrator.run_cycle(), Err(CycleError::Scan(_))));

        // No sweep either: the device is still IN despite the silence.
        assert_eq!(f.orchestrator.registry().records(), before);
        assert_eq!(f.orchestrator.activity().stats().scans_failed, 1);
    }

    #[test]
    fn test_silent_device_exits_on_later_cycle() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone()]);
        f.orchestrator.run_cycle().unwrap();

        f.clock.set(1031);
        let report = f.orchestrator.run_cycle().unwrap();
        assert_eq!(report.exited, 1);
        let record = f.orchestrator.registry().get("AA:BB").unwrap();
        assert_eq!(record.presence_state, PresenceState::Out);
        assert_eq!(record.exited_at, Some(1031));
    }

    #[test]
    fn test_subscribers_receive_snapshots() {
        let f = fixture(Duration::from_secs(5));
        let rx = f.orchestrator.subscribe();
        f.scanner.push_ok(vec![phone()]);
        f.orchestrator.run_cycle().unwrap();

        let views = rx.try_recv().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].address, "AA:BB");

        // A slow observer does not block the next cycle.
        f.orchestrator.run_cycle().unwrap();
        f.orchestrator.run_cycle().unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let f = fixture(Duration::from_secs(5));
        drop(f.orchestrator.subscribe());
        f.orchestrator.run_cycle().unwrap();
        assert!(lock(&f.orchestrator.subscribers).is_empty());
    }

    #[test]
    fn test_continuous_stops_between_cycles() {
        let f = fixture(Duration::from_millis(10));
        let (stop, signal) = stop_channel();
        let orchestrator = f.orchestrator.clone();
        let worker = thread::spawn(move || orchestrator.run_continuous(&signal));

        while f.scanner.calls.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        stop.stop();
        let cycles = worker.join().unwrap();
        assert!(cycles >= 3);
        assert_eq!(cycles as usize, f.scanner.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_continuous_survives_scan_errors() {
        let f = fixture(Duration::from_millis(1));
        f.scanner.push_err("busy");
        f.scanner.push_ok(vec![phone()]);
        let (stop, signal) = stop_channel();
        let orchestrator = f.orchestrator.clone();
        let worker = thread::spawn(move || orchestrator.run_continuous(&signal));

        while f.orchestrator.registry().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        stop.stop();
        worker.join().unwrap();
        assert_eq!(f.orchestrator.activity().stats().scans_failed, 1);
    }

    #[test]
    fn test_stop_before_start_runs_nothing() {
        let f = fixture(Duration::from_secs(5));
        let (stop, signal) = stop_channel();
        stop.stop();
        assert_eq!(f.orchestrator.run_continuous(&signal), 0);
        assert_eq!(f.scanner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_controller_toggle_and_trigger() {
        let f = fixture(Duration::from_millis(5));
        let controller = ScanController::new(f.orchestrator.clone());
        assert!(!controller.is_continuous());

        controller.set_continuous(true).unwrap();
        assert!(controller.is_continuous());
        controller.set_continuous(true).unwrap();

        f.scanner.push_ok(vec![phone()]);
        while f.orchestrator.registry().is_empty() {
            thread::sleep(Duration::from_millis(1));
        }

        controller.set_continuous(false).unwrap();
        assert!(!controller.is_continuous());
        let calls = f.scanner.calls.load(Ordering::SeqCst);

        controller.trigger_scan().unwrap();
        assert_eq!(f.scanner.calls.load(Ordering::SeqCst), calls + 1);
    }

    #[test]
    fn test_label_by_tag_persists() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone()]);
        f.orchestrator.run_cycle().unwrap();

        let tag = f.orchestrator.registry().get("AA:BB").unwrap().tag;
        let address = f.orchestrator.label(&tag, "Alice").unwrap();
        assert_eq!(address, "AA:BB");

        let saved = f.orchestrator.store().load().unwrap();
        assert_eq!(saved["AA:BB"].custom_label, "Alice");
    }

    #[test]
    fn test_label_unknown_leaves_file_unchanged() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone()]);
        f.orchestrator.run_cycle().unwrap();
        let path = f.orchestrator.store().path().to_path_buf();
        let before = std::fs::read(&path).unwrap();

        assert!(matches!(
            f.orchestrator.label("ZZ:ZZ", "Bob"),
            Err(CommandError::Registry(RegistryError::NotFound(_)))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_reset_saves_empty_registry() {
        let f = fixture(Duration::from_secs(5));
        f.scanner.push_ok(vec![phone(), Observation::new("CC:DD")]);
        f.orchestrator.run_cycle().unwrap();

        assert_eq!(f.orchestrator.reset().unwrap(), 2);
        assert!(f.orchestrator.store().load().unwrap().is_empty());
    }

    #[test]
    fn test_reset_zeroes_activity() {
        let dir = tempfile::tempdir().unwrap();
        let activity_path = dir.path().join("activity.json");
        let f = fixture(Duration::from_secs(5));
        let orchestrator = ScanOrchestrator::new(
            f.scanner.clone(),
            Arc::new(PresenceRegistry::default()),
            PersistenceStore::new(dir.path().join("devices.json"), CorruptStatePolicy::Fail),
            settings(Duration::from_secs(5)),
        )
        .with_activity(Arc::new(ActivityLog::with_persistence(activity_path.clone())));

        f.scanner.push_ok(vec![phone()]);
        orchestrator.run_cycle().unwrap();
        orchestrator.activity().save().unwrap();
        assert_eq!(orchestrator.activity().stats().cycles_completed, 1);

        orchestrator.reset().unwrap();
        assert_eq!(orchestrator.activity().stats().cycles_completed, 0);
        let resumed = ActivityLog::with_persistence(activity_path).stats();
        assert_eq!(resumed.cycles_completed, 0);
        assert_eq!(resumed.devices_discovered, 0);
    }

    #[test]
    fn test_commands_proceed_while_scan_is_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let registry = Arc::new(PresenceRegistry::default());
        registry.ingest(&[phone()], 900);

        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::new(GatedScanner {
                entered: entered_tx,
                release: release_rx,
            }),
            registry,
            PersistenceStore::new(dir.path().join("devices.json"), CorruptStatePolicy::Fail),
            settings(Duration::from_secs(5)),
        ));

        let scanning = Arc::clone(&orchestrator);
        let cycle = thread::spawn(move || scanning.run_cycle());
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = bounded(1);
        let commands = Arc::clone(&orchestrator);
        thread::spawn(move || {
            let labelled = commands.label("AA:BB", "Alice").is_ok();
            let views = commands.snapshot().len();
            let _ = done_tx.send((labelled, views));
        });
        let during_scan = done_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        cycle.join().unwrap().unwrap();

        assert_eq!(during_scan, Ok((true, 1)));
        assert_eq!(orchestrator.registry().len(), 2);
        assert_eq!(
            orchestrator.registry().get("AA:BB").unwrap().custom_label,
            "Alice"
        );
    }

    #[test]
    fn test_save_failure_keeps_memory_authoritative() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let scanner = Arc::new(ScriptedScanner::default());
        let orchestrator = Arc::new(ScanOrchestrator::new(
            scanner.clone(),
            Arc::new(PresenceRegistry::default()),
            PersistenceStore::new(blocker.join("devices.json"), CorruptStatePolicy::Fail),
            settings(Duration::from_millis(1)),
        ));

        scanner.push_ok(vec![phone()]);
        assert!(matches!(
            orchestrator.run_cycle(),
            Err(CycleError::Persist(PersistenceError::Write { .. }))
        ));
        let record = orchestrator.registry().get("AA:BB").unwrap();
        assert_eq!(record.presence_state, PresenceState::In);
        assert_eq!(record.observation_count, 1);
        let stats = orchestrator.activity().stats();
        assert_eq!(stats.saves_failed, 1);
        assert_eq!(stats.cycles_completed, 1);

        // The loop keeps cycling and keeps ingesting.
        scanner.push_ok(vec![phone()]);
        scanner.push_ok(vec![phone()]);
        let (stop, signal) = stop_channel();
        let looping = Arc::clone(&orchestrator);
        let worker = thread::spawn(move || looping.run_continuous(&signal));
        while scanner.calls.load(Ordering::SeqCst) < 4 {
            thread::sleep(Duration::from_millis(1));
        }
        stop.stop();
        let cycles = worker.join().unwrap();

        assert!(cycles >= 3);
        assert_eq!(orchestrator.registry().get("AA:BB").unwrap().observation_count, 3);
        assert!(orchestrator.activity().stats().saves_failed >= 4);
    }
}
