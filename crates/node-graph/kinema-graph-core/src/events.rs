//! Explicit edit events and the host notification hook.
//!
//! The core never relies on ambient mutation callbacks: every edit arrives as
//! an event object passed into a node's handler, and link rewiring flows back
//! to the host as [`LinkAction`]s instead of being applied behind its back.

use crate::socket::SocketRef;
use kinema_api_core::DataKind;
use serde::{Deserialize, Serialize};

/// A discrete graph-edit event delivered to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditEvent {
    /// A list-mode toggle on a vectorized node changed.
    FlagChanged { group: String, enabled: bool },
    /// The expression node's text was edited.
    ExpressionEdited { text: String },
    /// A link was attached to the expression node's placeholder input.
    /// `direct_origin` is the socket physically feeding it; `effective_kind`
    /// the upstream data kind after any implicit conversion.
    PlaceholderLinked {
        direct_origin: Option<SocketRef>,
        effective_kind: Option<DataKind>,
    },
    /// The user renamed one of the expression node's inputs.
    InputRenamed { identifier: String, name: String },
    /// The user deleted one of the expression node's inputs.
    InputRemoved { identifier: String },
}

/// Link rewiring the host must apply after a schema transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LinkAction {
    /// Remove every link currently attached to `socket`.
    DropLinks { socket: SocketRef },
    /// Connect `from` (an output socket) to `to` (an input socket).
    Connect { from: SocketRef, to: SocketRef },
}

/// Invoked whenever a node's contributed code may have changed, so the host
/// can recompile the graph.
pub trait CompileNotifier {
    fn execution_code_changed(&mut self);
}

/// Notifier for hosts that recompile unconditionally on every tick.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl CompileNotifier for NullNotifier {
    fn execution_code_changed(&mut self) {}
}

/// Counts notifications; handy for hosts that debounce recompiles and for
/// tests.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    pub count: usize,
}

impl CompileNotifier for CountingNotifier {
    fn execution_code_changed(&mut self) {
        self.count += 1;
    }
}
