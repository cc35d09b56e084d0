//! Scan session: decoder, record store and persistence behind one value.
//!
//! Raw payloads arrive one at a time from the frame scanner (or any other
//! source). Each is checked against the previous payload for duplicate
//! suppression, decoded, merged into the store, and the store snapshot is
//! written back when persistence is configured.

use anyhow::Result;

use crate::config::ScannerConfig;
use crate::decode::PayloadDecoder;
use crate::record::Record;
use crate::scanner::{FrameScanner, Tick};
use crate::store::{RecordStore, SnapshotStore, SqliteSnapshotStore, UpsertOutcome};
use crate::ScanError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Same raw payload as the previous one, inside the duplicate window.
    Suppressed,
    Stored(UpsertOutcome),
}

#[derive(Clone, Debug)]
struct LastPayload {
    raw: String,
    at_ms: u64,
}

pub struct ScanSession {
    config: ScannerConfig,
    decoder: PayloadDecoder,
    store: RecordStore,
    persistence: Option<Box<dyn SnapshotStore>>,
    last_payload: Option<LastPayload>,
}

impl ScanSession {
    /// Build a session, restoring any snapshot `persistence` holds.
    pub fn open(
        config: ScannerConfig,
        persistence: Option<Box<dyn SnapshotStore>>,
    ) -> Result<Self> {
        let mut store = RecordStore::new(config.key_profile);
        if let Some(snapshots) = persistence.as_ref() {
            let entries = snapshots.load()?;
            log::info!("restored {} records from snapshot", entries.len());
            store.restore(entries);
        }
        Ok(Self {
            config,
            decoder: PayloadDecoder::new(),
            store,
            persistence,
            last_payload: None,
        })
    }

    /// Open with SQLite persistence when the config names a snapshot path.
    pub fn from_config(config: ScannerConfig) -> Result<Self> {
        let persistence: Option<Box<dyn SnapshotStore>> = match config.snapshot_path.as_ref() {
            Some(path) => Some(Box::new(SqliteSnapshotStore::open(path)?)),
            None => None,
        };
        Self::open(config, persistence)
    }

    pub fn with_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn record(&self, key: &str) -> Option<&Record> {
        self.store.get(key)
    }

    /// Feed one raw payload.
    ///
    /// A payload identical to the previous one and arriving within the
    /// duplicate window is suppressed before the decoder runs. Every other
    /// payload, decodable or not, becomes the new reference.
    pub fn handle_payload(&mut self, raw: &str, now_ms: u64) -> Result<ScanOutcome, ScanError> {
        if self.is_duplicate(raw, now_ms) {
            log::debug!("suppressed repeat payload ({} chars)", raw.len());
            return Ok(ScanOutcome::Suppressed);
        }
        self.last_payload = Some(LastPayload {
            raw: raw.to_string(),
            at_ms: now_ms,
        });

        let record = self.decoder.decode(raw).map_err(|e| {
            log::debug!("payload rejected ({} chars): {}", raw.len(), e);
            e
        })?;
        let source = record.source;
        let outcome = self.store.upsert(record, now_ms)?;
        log::info!(
            "{} {} record {}",
            if outcome.is_insert() { "stored" } else { "updated" },
            source.as_str(),
            outcome.key()
        );
        self.persist(now_ms);
        Ok(ScanOutcome::Stored(outcome))
    }

    /// Drive one frame tick and route any detection into `handle_payload`.
    ///
    /// Returns `Ok(None)` when the tick produced no payload. Decode errors are
    /// returned to the caller; the scanner keeps running either way.
    pub fn pump(
        &mut self,
        scanner: &mut FrameScanner,
        now_ms: u64,
    ) -> Result<Option<ScanOutcome>, ScanError> {
        match scanner.on_frame(now_ms) {
            Tick::Detected(raw) => self.handle_payload(&raw, now_ms).map(Some),
            _ => Ok(None),
        }
    }

    /// Empty the store and the persisted snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear();
        self.last_payload = None;
        if let Some(snapshots) = self.persistence.as_mut() {
            snapshots.clear()?;
        }
        log::info!("record store cleared");
        Ok(())
    }

    fn is_duplicate(&self, raw: &str, now_ms: u64) -> bool {
        match self.last_payload.as_ref() {
            // A clock that stepped backward counts as inside the window.
            Some(last) => {
                last.raw == raw
                    && now_ms.saturating_sub(last.at_ms) < self.config.duplicate_window_ms
            }
            None => false,
        }
    }

    fn persist(&mut self, now_ms: u64) {
        if let Some(snapshots) = self.persistence.as_mut() {
            if let Err(e) = snapshots.save(&self.store.snapshot(), now_ms) {
                log::warn!("failed to persist record snapshot: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::decode::Inflater;
    use crate::detect::backends::ScriptedSoftwareDecoder;
    use crate::detect::DetectionBackend;
    use crate::ingest::StubCamera;
    use crate::record::Source;
    use crate::scanner::ScannerSettings;
    use crate::store::{InMemorySnapshotStore, SnapshotEntry};

    const JANE: &str = "name=Jane Doe; dob=1990-01-01; email=jane@x.com";

    fn session() -> ScanSession {
        ScanSession::open(ScannerConfig::default(), None).unwrap()
    }

    #[test]
    fn key_value_payload_is_stored() {
        let mut session = session();
        let outcome = session.handle_payload(JANE, 1_000).unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Stored(UpsertOutcome::Inserted("email:jane@x.com".to_string()))
        );
        let record = session.record("email:jane@x.com").unwrap();
        assert_eq!(record.dob, "1990-01-01");
        assert_eq!(record.source, Source::KeyValue);
        assert_eq!(record.last_seen, 1_000);
    }

    #[test]
    fn repeat_inside_window_skips_decoder() {
        let mut session = session();
        assert_eq!(
            session.handle_payload("not a code", 0),
            Err(ScanError::UnrecognizedFormat)
        );
        // Decoding would fail again; suppression means it never runs.
        assert_eq!(
            session.handle_payload("not a code", 1_199),
            Ok(ScanOutcome::Suppressed)
        );
        assert_eq!(
            session.handle_payload("not a code", 1_200),
            Err(ScanError::UnrecognizedFormat)
        );
    }

    #[test]
    fn backward_clock_step_stays_inside_window() {
        let mut session = session();
        session.handle_payload(JANE, 10_000).unwrap();
        assert_eq!(
            session.handle_payload(JANE, 9_900),
            Ok(ScanOutcome::Suppressed)
        );
        assert_eq!(session.record("email:jane@x.com").unwrap().last_seen, 10_000);
    }

    struct CountingInflater(Arc<AtomicUsize>);

    impl Inflater for CountingInflater {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn inflate(&self, _compressed: &[u8]) -> std::io::Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "not deflate"))
        }
    }

    #[test]
    fn decoder_never_runs_for_suppressed_repeats() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = session()
            .with_decoder(PayloadDecoder::with_inflater(Box::new(CountingInflater(calls.clone()))));
        let digits = "7".repeat(60);

        assert!(session.handle_payload(&digits, 0).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for t in [1, 600, 1_199] {
            assert_eq!(session.handle_payload(&digits, t), Ok(ScanOutcome::Suppressed));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(session.handle_payload(&digits, 1_200).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn different_payload_resets_reference() {
        let mut session = session();
        session.handle_payload(JANE, 0).unwrap();
        session.handle_payload("garbage", 100).unwrap_err();
        let outcome = session.handle_payload(JANE, 200).unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Stored(UpsertOutcome::Updated("email:jane@x.com".to_string()))
        );
        assert_eq!(session.record("email:jane@x.com").unwrap().last_seen, 200);
    }

    #[test]
    fn keyless_payload_is_rejected() {
        let mut session = session();
        assert_eq!(
            session.handle_payload("gender=F; age=34", 0),
            Err(ScanError::NoIdentityKey)
        );
        assert!(session.store().is_empty());
    }

    #[test]
    fn opening_restores_and_upserts_persist() {
        let mut saved = InMemorySnapshotStore::new();
        saved
            .save(
                &[SnapshotEntry {
                    key: "email:old@x.com".to_string(),
                    record: Record {
                        email: "old@x.com".to_string(),
                        ..Record::new(Source::Json)
                    },
                }],
                0,
            )
            .unwrap();

        let mut session = ScanSession::open(ScannerConfig::default(), Some(Box::new(saved))).unwrap();
        assert_eq!(session.store().keys(), &["email:old@x.com"]);

        session.handle_payload(JANE, 10).unwrap();
        let persisted = session.persistence.as_ref().unwrap().load().unwrap();
        let keys: Vec<&str> = persisted.iter().map(|entry| entry.key.as_str()).collect();
        assert_eq!(keys, vec!["email:jane@x.com", "email:old@x.com"]);

        session.clear().unwrap();
        assert!(session.store().is_empty());
        assert!(session.persistence.as_ref().unwrap().load().unwrap().is_empty());
    }

    #[test]
    fn pump_routes_detections() {
        let backend = DetectionBackend::Software(Box::new(ScriptedSoftwareDecoder::new(vec![
            None,
            Some(JANE),
            Some("garbage"),
        ])));
        let mut scanner =
            FrameScanner::new(StubCamera::new(), backend, ScannerSettings::default());
        scanner.start().unwrap();

        let mut session = session();
        assert_eq!(session.pump(&mut scanner, 0), Ok(None));
        assert_eq!(session.pump(&mut scanner, 50), Ok(None));
        assert!(matches!(
            session.pump(&mut scanner, 200),
            Ok(Some(ScanOutcome::Stored(_)))
        ));
        assert_eq!(
            session.pump(&mut scanner, 400),
            Err(ScanError::UnrecognizedFormat)
        );
        assert!(scanner.is_active());
        assert_eq!(session.store().len(), 1);
    }
}
