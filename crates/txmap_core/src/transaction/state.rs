//! Transaction lifecycle state.

/// Where a transaction token currently stands on an overlay.
///
/// ```text
///            start              suspend
///  Absent ──────────▶ Active ◀──────────▶ Suspended
///    ▲                  │       resume        │
///    └──────────────────┴─────────────────────┘
///        commit / rollback      (never directly)
/// ```
///
/// A suspended transaction must be resumed before it can be committed or
/// rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Installed in some thread's active slot.
    Active,
    /// Parked in the suspended registry.
    Suspended,
    /// Not known to the overlay: never started, or already ended.
    Absent,
}

impl TransactionState {
    /// Returns true if the token belongs to a transaction that has started
    /// and not yet ended.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        !matches!(self, Self::Absent)
    }
}
