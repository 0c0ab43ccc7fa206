//! End-to-end tests for the presence registry, driven through a feed file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tagwatch::core::{ManualClock, PresenceState};
use tagwatch::{
    generate_tag, CorruptStatePolicy, CycleError, FeedScanner, PersistenceStore, PresenceRegistry,
    ScanController, ScanOrchestrator, ScanSettings, TagGenerator,
};

struct Harness {
    dir: tempfile::TempDir,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Arc::new(ManualClock::new(1000)),
        }
    }

    fn feed_path(&self) -> std::path::PathBuf {
        self.dir.path().join("feed.json")
    }

    fn write_feed(&self, json: &str) {
        std::fs::write(self.feed_path(), json).unwrap();
    }

    fn store(&self) -> PersistenceStore {
        PersistenceStore::new(
            self.dir.path().join("data").join("devices.json"),
            CorruptStatePolicy::Fail,
        )
    }

    /// Build an orchestrator the way the binary does: load, then wire up.
    fn open(&self) -> Arc<ScanOrchestrator> {
        let store = self.store();
        let snapshot = store.load().unwrap();
        let registry = Arc::new(PresenceRegistry::from_snapshot(
            TagGenerator::default(),
            snapshot,
        ));
        let settings = ScanSettings::new(
            Duration::from_secs(4),
            Duration::from_millis(10),
            Duration::from_secs(30),
        )
        .unwrap();

        Arc::new(
            ScanOrchestrator::new(
                Arc::new(FeedScanner::new(self.feed_path())),
                registry,
                store,
                settings,
            )
            .with_clock(self.clock.clone()),
        )
    }
}

fn file_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[test]
fn test_enter_exit_reenter_scenario() {
    let h = Harness::new();
    let orchestrator = h.open();

    h.write_feed(r#"[{"address": "AA:BB", "name": "Phone1", "signal_strength": -60}]"#);
    orchestrator.run_cycle().unwrap();

    let record = orchestrator.registry().get("AA:BB").unwrap();
    assert_eq!(record.tag, generate_tag("AA:BB"));
    assert_eq!(record.presence_state, PresenceState::In);
    assert_eq!(record.observation_count, 1);

    h.write_feed("[]");
    h.clock.set(1031);
    orchestrator.run_cycle().unwrap();
    let record = orchestrator.registry().get("AA:BB").unwrap();
    assert_eq!(record.presence_state, PresenceState::Out);
    assert_eq!(record.exited_at, Some(1031));

    h.write_feed(r#"[{"address": "AA:BB"}]"#);
    h.clock.set(1032);
    orchestrator.run_cycle().unwrap();
    let record = orchestrator.registry().get("AA:BB").unwrap();
    assert_eq!(record.presence_state, PresenceState::In);
    assert_eq!(record.observation_count, 2);
    assert_eq!(record.observed_name, "Phone1");
}

#[test]
fn test_registry_survives_restart() {
    let h = Harness::new();
    let first = h.open();
    h.write_feed(
        r#"[{"address": "AA:BB", "name": "Phone1", "signal_strength": -60},
            {"address": "CC:DD", "rssi": -80}]"#,
    );
    first.run_cycle().unwrap();
    first.label("AA:BB", "Alice").unwrap();
    let before = first.registry().records();
    drop(first);

    let second = h.open();
    assert_eq!(second.registry().records(), before);
    assert_eq!(
        second.registry().get("AA:BB").unwrap().tag,
        generate_tag("AA:BB")
    );

    let views = second.snapshot();
    assert_eq!(views.len(), 2);
    let alice = views.iter().find(|v| v.address == "AA:BB").unwrap();
    assert_eq!(alice.display_label, "Alice");
}

#[test]
fn test_missing_feed_skips_cycle() {
    let h = Harness::new();
    let orchestrator = h.open();

    assert!(matches!(orchestrator.run_cycle(), Err(CycleError::Scan(_))));
    assert!(orchestrator.registry().is_empty());
    assert!(!orchestrator.store().path().exists());
}

#[test]
fn test_malformed_feed_does_not_touch_saved_state() {
    let h = Harness::new();
    let orchestrator = h.open();
    h.write_feed(r#"[{"address": "AA:BB"}]"#);
    orchestrator.run_cycle().unwrap();
    let saved = file_bytes(orchestrator.store().path());

    h.write_feed("[{\"address\": ");
    h.clock.advance(60);
    assert!(matches!(orchestrator.run_cycle(), Err(CycleError::Scan(_))));
    assert_eq!(file_bytes(orchestrator.store().path()), saved);
    assert_eq!(
        orchestrator.registry().get("AA:BB").unwrap().presence_state,
        PresenceState::In
    );
}

#[test]
fn test_unknown_label_leaves_file_byte_identical() {
    let h = Harness::new();
    let orchestrator = h.open();
    h.write_feed(r#"[{"address": "AA:BB"}]"#);
    orchestrator.run_cycle().unwrap();
    let saved = file_bytes(orchestrator.store().path());

    assert!(orchestrator.label("TAG-FFFFFFFF", "Nobody").is_err());
    assert_eq!(file_bytes(orchestrator.store().path()), saved);
}

#[test]
fn test_controller_continuous_then_shutdown_keeps_valid_snapshot() {
    let h = Harness::new();
    h.write_feed(r#"[{"address": "AA:BB"}, {"address": "CC:DD"}]"#);
    let orchestrator = h.open();
    let snapshots = orchestrator.subscribe();
    let controller = ScanController::new(orchestrator.clone());

    controller.set_continuous(true).unwrap();
    let views = snapshots.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(views.len(), 2);
    controller.shutdown();
    assert!(!controller.is_continuous());

    let reloaded = h.store().load().unwrap();
    assert_eq!(reloaded.len(), 2);
    assert!(reloaded.values().all(|r| r.observation_count >= 1));
}

#[test]
fn test_reset_then_reload_is_empty() {
    let h = Harness::new();
    let orchestrator = h.open();
    h.write_feed(r#"[{"address": "AA:BB"}]"#);
    orchestrator.run_cycle().unwrap();

    assert_eq!(orchestrator.reset().unwrap(), 1);
    drop(orchestrator);

    assert!(h.open().registry().is_empty());
}
