//! Lifecycle states and observability events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a `TagControl`.
///
/// ```text
/// Uninitialized ──► Loading ──► Ready ◄──► Reconciling
///                      │          │
///                      ▼          ▼
///                  Disabled    Disposed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlState {
    Uninitialized,
    Loading,
    Ready,
    Reconciling,
    /// Loading failed; the control shows an empty, read-only selection
    Disabled,
    /// Torn down; terminal
    Disposed,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlState::Uninitialized => "uninitialized",
            ControlState::Loading => "loading",
            ControlState::Ready => "ready",
            ControlState::Reconciling => "reconciling",
            ControlState::Disabled => "disabled",
            ControlState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationOp {
    Link,
    Unlink,
}

/// Events emitted by the control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlEvent {
    StateChanged {
        from: ControlState,
        to: ControlState,
    },
    /// Initial selection loaded
    Loaded { selected: usize },
    /// Loading failed
    Disabled { reason: String },
    /// One link/unlink call failed; not retried
    AssociationFailed {
        operation: AssociationOp,
        key: String,
        message: String,
    },
    /// A reconciliation settled and the selection was replaced
    Reconciled {
        added: usize,
        removed: usize,
        failed: usize,
        remote: bool,
    },
    /// The host was told to re-read the output value
    OutputChanged,
}

/// Callback for control events
pub type ControlEventHandler = Box<dyn Fn(ControlEvent) + Send + Sync>;
