//! Code-generation core of the Kinema node graph.
//!
//! Each node in the graph contributes a fragment of executable logic; this
//! crate decides *what* a node contributes. The modules are organised to keep
//! the concerns isolated:
//!
//! - [`socket`] describes the named, typed slots on a node.
//! - [`vectorize`] resolves whether a node runs its single-value or sequence
//!   code path from its list-mode flags.
//! - [`contribute`] is the contract every node fulfils: a typed code fragment
//!   or a delegated batch call, plus the support modules it needs in scope.
//! - [`expr`] is the embedded mini-language behind the expression node:
//!   parse-only validation and a sandboxed evaluator.
//! - [`nodes`] hosts the two concrete node kinds (compose-transform and
//!   expression) and the edit-time schema machinery of the latter.
//! - [`batch`] implements the broadcast rules for list-mode execution.
//! - [`runtime`] is a reference consumer that executes contributions the way
//!   the external graph compiler would; hosts and the behavioural tests go
//!   through it.
//!
//! Everything here is single-threaded and synchronous: schema mutation and
//! vectorization resolution react to discrete edit events, and evaluation is
//! one call per node per graph run.

pub mod batch;
pub mod contribute;
pub mod events;
pub mod expr;
pub mod nodes;
pub mod runtime;
pub mod socket;
pub mod vectorize;

pub use contribute::{CodeExpr, CodeFragment, Contribution, DelegatedCall, NodeLogic};
pub use events::{CompileNotifier, EditEvent, LinkAction, NullNotifier};
pub use nodes::{ComposeTransformNode, ExpressionNode, GraphNode};
pub use runtime::{evaluate_all, GraphRuntime};
pub use socket::{NodeId, SocketDescriptor, SocketRef};
pub use vectorize::ExecutionVariant;
