//! Concrete node kinds built on the contribution protocol.

pub mod compose_transform;
pub mod expression;

pub use compose_transform::ComposeTransformNode;
pub use expression::ExpressionNode;

use crate::contribute::{Contribution, NodeLogic};
use crate::events::{CompileNotifier, EditEvent, LinkAction};
use crate::socket::{SocketDescriptor, SocketRef};
use kinema_api_core::SchemaError;
use std::collections::BTreeSet;

/// A node participating in graph compilation.
#[derive(Debug)]
pub enum GraphNode {
    ComposeTransform(ComposeTransformNode),
    Expression(ExpressionNode),
}

impl GraphNode {
    /// Dispatch a graph-edit event to the node's handler. Events a node kind
    /// does not understand are rejected without touching its state.
    pub fn apply_edit(
        &mut self,
        event: EditEvent,
        notifier: &mut dyn CompileNotifier,
    ) -> Result<Vec<LinkAction>, SchemaError> {
        match (self, event) {
            (GraphNode::ComposeTransform(node), EditEvent::FlagChanged { group, enabled }) => {
                node.set_list_mode(&group, enabled, notifier)?;
                Ok(Vec::new())
            }
            (GraphNode::Expression(node), EditEvent::ExpressionEdited { text }) => {
                node.edit_expression(&text, notifier);
                Ok(Vec::new())
            }
            (
                GraphNode::Expression(node),
                EditEvent::PlaceholderLinked {
                    direct_origin,
                    effective_kind,
                },
            ) => Ok(node.link_placeholder(direct_origin, effective_kind, notifier)),
            (GraphNode::Expression(node), EditEvent::InputRenamed { identifier, name }) => {
                node.rename_input(&identifier, &name, notifier)?;
                Ok(Vec::new())
            }
            (GraphNode::Expression(node), EditEvent::InputRemoved { identifier }) => {
                node.remove_input(&identifier, notifier)
            }
            _ => Err(SchemaError::UnsupportedEdit),
        }
    }

    /// Record a link on one of this node's input sockets.
    pub fn connect_input(&mut self, identifier: &str, from: SocketRef) -> Result<(), SchemaError> {
        let inputs = match self {
            GraphNode::ComposeTransform(node) => node.inputs_mut(),
            GraphNode::Expression(node) => node.inputs_mut(),
        };
        let socket = crate::socket::find_mut(inputs, identifier)
            .ok_or_else(|| SchemaError::UnknownSocket(identifier.to_string()))?;
        socket.connection = Some(from);
        Ok(())
    }

    /// Store a captured evaluation failure on the owning node, when the node
    /// kind keeps per-run error state.
    pub fn record_runtime_error(&mut self, message: &str) {
        if let GraphNode::Expression(node) = self {
            node.set_runtime_error(message);
        }
    }

    /// Clear per-run error state at the start of an evaluation of this node.
    pub fn clear_runtime_error(&mut self) {
        if let GraphNode::Expression(node) = self {
            node.set_runtime_error("");
        }
    }
}

impl NodeLogic for GraphNode {
    fn id(&self) -> &str {
        match self {
            GraphNode::ComposeTransform(node) => node.id(),
            GraphNode::Expression(node) => node.id(),
        }
    }

    fn inputs(&self) -> &[SocketDescriptor] {
        match self {
            GraphNode::ComposeTransform(node) => node.inputs(),
            GraphNode::Expression(node) => node.inputs(),
        }
    }

    fn outputs(&self) -> &[SocketDescriptor] {
        match self {
            GraphNode::ComposeTransform(node) => node.outputs(),
            GraphNode::Expression(node) => node.outputs(),
        }
    }

    fn bound_input_names(&self) -> Vec<String> {
        match self {
            GraphNode::ComposeTransform(node) => node.bound_input_names(),
            GraphNode::Expression(node) => node.bound_input_names(),
        }
    }

    fn contribute_code(&self, bound: &[String]) -> Contribution {
        match self {
            GraphNode::ComposeTransform(node) => node.contribute_code(bound),
            GraphNode::Expression(node) => node.contribute_code(bound),
        }
    }

    fn required_support_modules(&self) -> BTreeSet<&'static str> {
        match self {
            GraphNode::ComposeTransform(node) => node.required_support_modules(),
            GraphNode::Expression(node) => node.required_support_modules(),
        }
    }
}
