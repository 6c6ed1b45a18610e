//! The per-session negotiation state machine.

use tokex_core::{Party, Proposal};

/// Where one (proposal, receiver) session stands.
///
/// ```text
///  propose
///     |
///     v
/// +--------+  accept  +-----------+  confirm  +---------+
/// | OFFERO |--------->| CONCENTIO |---------->| RECIPIO |
/// +--------+          +-----------+           +---------+
///     | reject             | abort
///     v                    v
///  REJECTED             ABORTED
/// ```
///
/// `Recipio`, `Rejected` and `Aborted` are terminal. `Finalizing` is the
/// transient occupied while a confirm runs the finalizer; it keeps a
/// concurrent confirm or abort from racing the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Proposal sent; awaiting the receiver's acceptance or rejection.
    Offero,
    /// Proposal accepted; awaiting the proposer's confirmation or abortion
    /// until the acceptance deadline, unix ms.
    Concentio { acceptance_deadline: i64 },
    /// Confirmation in flight; the finalizer is running.
    Finalizing,
    /// Proposal confirmed and finalized. Terminal.
    Recipio,
    /// Proposal rejected by the receiver. Terminal.
    Rejected,
    /// Proposal aborted by the proposer, or failed finalization. Terminal.
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Recipio | Self::Rejected | Self::Aborted)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offero => "OFFERO",
            Self::Concentio { .. } => "CONCENTIO",
            Self::Finalizing => "FINALIZING",
            Self::Recipio => "RECIPIO",
            Self::Rejected => "REJECTED",
            Self::Aborted => "ABORTED",
        }
    }
}

/// One negotiation between a proposer and a single receiver.
#[derive(Debug, Clone)]
pub struct Session {
    pub proposal: Proposal,
    pub proposer: Party,
    pub receiver: Party,
    pub state: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!SessionState::Offero.is_terminal());
        assert!(!SessionState::Concentio {
            acceptance_deadline: 0
        }
        .is_terminal());
        assert!(!SessionState::Finalizing.is_terminal());
        assert!(SessionState::Recipio.is_terminal());
        assert!(SessionState::Rejected.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
    }
}
