//! The code-contribution protocol.
//!
//! Every node hands the graph compiler a typed fragment rather than program
//! text: a list of named bindings over a small expression tree, or an
//! explicit descriptor delegating execution to a named batch function. The
//! compiler assembles fragments itself, which keeps identifier references
//! statically checkable.

use crate::expr::Expr;
use crate::socket::SocketDescriptor;
use hashbrown::HashSet;
use kinema_api_core::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Typed expression tree a fragment binds its outputs to.
#[derive(Clone, Debug)]
pub enum CodeExpr {
    /// A constant value.
    Const(Value),
    /// A bound input, by the name the compiler bound it under.
    Input(String),
    /// A call into a support module the node declared via
    /// [`NodeLogic::required_support_modules`].
    Call {
        module: &'static str,
        function: &'static str,
        args: Vec<CodeExpr>,
    },
    /// A guarded user expression. Evaluation failures are captured as
    /// node-local state and yield an empty value; they never propagate.
    UserExpr(Expr),
}

/// A named-binding fragment contributed by one node.
#[derive(Clone, Debug, Default)]
pub struct CodeFragment {
    pub bindings: Vec<(String, CodeExpr)>,
}

impl CodeFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, expr: CodeExpr) -> Self {
        self.bindings.push((name.into(), expr));
        self
    }

    /// Statically check that every [`CodeExpr::Input`] reference names a
    /// bound input. User expressions resolve their variables at evaluation
    /// time and are skipped here.
    pub fn validate(&self, available: &HashSet<String>) -> Result<(), CodegenError> {
        fn walk(expr: &CodeExpr, available: &HashSet<String>) -> Result<(), CodegenError> {
            match expr {
                CodeExpr::Const(_) | CodeExpr::UserExpr(_) => Ok(()),
                CodeExpr::Input(name) => {
                    if available.contains(name) {
                        Ok(())
                    } else {
                        Err(CodegenError::UnknownInput(name.clone()))
                    }
                }
                CodeExpr::Call { args, .. } => {
                    for arg in args {
                        walk(arg, available)?;
                    }
                    Ok(())
                }
            }
        }

        for (_, expr) in &self.bindings {
            walk(expr, available)?;
        }
        Ok(())
    }
}

/// Descriptor for the batch (list-mode) execution path: the compiler invokes
/// `function` once with the full input sequences instead of inlining
/// per-element code.
#[derive(Clone, Debug)]
pub struct DelegatedCall {
    pub function: &'static str,
    /// Bound input names, in socket order.
    pub inputs: Vec<String>,
    /// Name the aggregated output sequence is bound under.
    pub output: String,
}

/// What a node contributes to the compiled graph.
#[derive(Clone, Debug)]
pub enum Contribution {
    Inline(CodeFragment),
    Delegated(DelegatedCall),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("fragment references unknown input '{0}'")]
    UnknownInput(String),
}

/// The node-logic capability: what a node contributes, independent of how it
/// is drawn. Presentation lives in a host-side adapter that composes this.
pub trait NodeLogic {
    fn id(&self) -> &str;

    fn inputs(&self) -> &[SocketDescriptor];

    fn outputs(&self) -> &[SocketDescriptor];

    /// Ordered names the compiler binds input values under, aligned with the
    /// bindable inputs (control sockets do not bind).
    fn bound_input_names(&self) -> Vec<String>;

    /// Produce this node's contribution given the names its inputs were
    /// bound under.
    fn contribute_code(&self, bound: &[String]) -> Contribution;

    /// Support modules that must be in scope when this node's contribution
    /// executes.
    fn required_support_modules(&self) -> BTreeSet<&'static str>;
}
