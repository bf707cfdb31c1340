//! Overlay configuration.

/// Configuration for an [`crate::Overlay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayConfig {
    /// Commit mode.
    ///
    /// When false (the default), commit issues only the removes that are
    /// still pending, so a key removed and then put again is only put.
    ///
    /// When true, every key a `remove` was issued for since the last `clear`
    /// is removed from the backing map at commit before any put, even if a
    /// later put supersedes it. Backing maps that observe their mutation
    /// calls see each semantic removal.
    pub replay_all_removes: bool,
}

impl OverlayConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the commit mode.
    #[must_use]
    pub const fn replay_all_removes(mut self, value: bool) -> Self {
        self.replay_all_removes = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_minimal_apply() {
        assert!(!OverlayConfig::default().replay_all_removes);
    }

    #[test]
    fn builder_pattern() {
        let config = OverlayConfig::new().replay_all_removes(true);
        assert!(config.replay_all_removes);
    }
}
