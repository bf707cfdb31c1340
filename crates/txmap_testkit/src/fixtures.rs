//! Test fixtures and overlay helpers.

use crate::recording::{CallLog, RecordingMap};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;
use txmap_core::{Overlay, OverlayConfig};

/// Overlay type used by most tests: string keys and values, numeric tokens.
pub type StringOverlay = Overlay<String, String, u32>;

/// Installs a `tracing` subscriber for tests, once per process.
///
/// Honours `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn owned(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Creates an overlay over a `HashMap` holding `entries`.
pub fn seeded_overlay(entries: &[(&str, &str)]) -> StringOverlay {
    let map: HashMap<String, String> = owned(entries).into_iter().collect();
    Overlay::new(map)
}

/// Creates an overlay over a [`RecordingMap`] holding `entries`, returning
/// the overlay and the map's call log.
pub fn recording_overlay(
    entries: &[(&str, &str)],
    config: OverlayConfig,
) -> (StringOverlay, CallLog<String, String>) {
    let map = RecordingMap::with_entries(owned(entries));
    let log = map.log();
    (Overlay::with_config(map, config), log)
}

/// Returns the store's committed entries as a map, bypassing any active
/// transaction of the calling thread.
pub fn committed(overlay: &StringOverlay) -> HashMap<String, String> {
    overlay
        .store()
        .entries()
        .expect("store entries")
        .into_iter()
        .collect()
}

/// Builds an owned entry map from string pairs.
pub fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    owned(pairs).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_overlay_holds_entries() {
        let overlay = seeded_overlay(&[("a", "1"), ("b", "2")]);
        assert_eq!(committed(&overlay), entries(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn recording_overlay_does_not_record_seed() {
        let (overlay, log) = recording_overlay(&[("a", "1")], OverlayConfig::default());
        assert!(log.is_empty());

        overlay.put("b".into(), "2".into()).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
