//! Expression node: a node whose input schema grows at edit time and whose
//! body is a user-entered expression.
//!
//! The schema machinery is a synchronous state machine over the input list,
//! driven by graph-edit events; it never runs during graph execution. The
//! node always carries one placeholder input ("New Input") in last position:
//! linking anything to it synthesizes a permanent input of the upstream's
//! effective data kind and moves the link there, leaving the placeholder free
//! for the next connection.

use crate::contribute::{CodeExpr, CodeFragment, Contribution, NodeLogic};
use crate::events::{CompileNotifier, LinkAction};
use crate::expr::Expr;
use crate::socket::{NodeId, SocketDescriptor, SocketRef};
use hashbrown::HashMap;
use kinema_api_core::{DataKind, SchemaError, Value};
use std::collections::BTreeSet;

pub const PLACEHOLDER_IDENTIFIER: &str = "new_input";
pub const RESULT_IDENTIFIER: &str = "result";

const SUPPORT_MODULE: &str = "expr_std";

/// Single-letter variable names handed to synthesized inputs, in priority
/// order; x, y, z first, then the rest of the alphabet.
const NAME_LETTERS: &str = "xyzabcdefghijklmnopqrstuvw";

/// The name pool: every single letter, then every two-letter combination in
/// the same ordering, so uniqueness survives far past the single letters.
fn pool_names() -> impl Iterator<Item = String> {
    NAME_LETTERS.chars().map(String::from).chain(
        NAME_LETTERS
            .chars()
            .flat_map(|first| NAME_LETTERS.chars().map(move |second| format!("{first}{second}"))),
    )
}

#[derive(Debug)]
pub struct ExpressionNode {
    id: NodeId,
    expression: String,
    syntax_valid: bool,
    last_runtime_error: String,
    inputs: Vec<SocketDescriptor>,
    outputs: Vec<SocketDescriptor>,
    // Monotonic; identifiers are never reused after a socket is removed.
    next_socket_serial: u64,
}

impl ExpressionNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let mut placeholder =
            SocketDescriptor::new(DataKind::Control, PLACEHOLDER_IDENTIFIER, "New Input");
        placeholder.display.show_custom_name = false;

        ExpressionNode {
            id: id.into(),
            expression: String::new(),
            syntax_valid: true,
            last_runtime_error: String::new(),
            inputs: vec![placeholder],
            outputs: vec![SocketDescriptor::new(
                DataKind::Generic,
                RESULT_IDENTIFIER,
                "Result",
            )],
            next_socket_serial: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &[SocketDescriptor] {
        &self.inputs
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [SocketDescriptor] {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &[SocketDescriptor] {
        &self.outputs
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn syntax_valid(&self) -> bool {
        self.syntax_valid
    }

    pub fn last_runtime_error(&self) -> &str {
        &self.last_runtime_error
    }

    pub(crate) fn set_runtime_error(&mut self, message: &str) {
        self.last_runtime_error = message.to_string();
    }

    /// Display-name view of the permanent inputs, used to keep names unique.
    pub fn inputs_by_custom_name(&self) -> HashMap<String, String> {
        self.permanent_inputs()
            .map(|socket| (socket.display_name.clone(), socket.identifier.clone()))
            .collect()
    }

    fn permanent_inputs(&self) -> impl Iterator<Item = &SocketDescriptor> {
        self.inputs
            .iter()
            .filter(|socket| !socket.data_kind.is_control())
    }

    /// Store new expression text, revalidate, and signal the host.
    ///
    /// Empty text carries no syntax error; it simply contributes an empty
    /// result.
    pub fn edit_expression(&mut self, text: &str, notifier: &mut dyn CompileNotifier) {
        self.expression = text.to_string();
        self.setting_changed(notifier);
    }

    fn setting_changed(&mut self, notifier: &mut dyn CompileNotifier) {
        self.last_runtime_error.clear();
        let trimmed = self.expression.trim();
        self.syntax_valid = trimmed.is_empty() || Expr::is_valid(trimmed);
        log::debug!(
            "node '{}': expression {} ({} chars)",
            self.id,
            if self.syntax_valid { "valid" } else { "has syntax error" },
            self.expression.len()
        );
        notifier.execution_code_changed();
    }

    /// React to a link landing on the placeholder input.
    ///
    /// Synthesizes a permanent input of the origin's effective kind, names it
    /// from the pool, and returns the rewiring that moves the link off the
    /// placeholder. No transition happens without a direct origin or when the
    /// origin is itself a control socket.
    pub fn link_placeholder(
        &mut self,
        direct_origin: Option<SocketRef>,
        effective_kind: Option<DataKind>,
        notifier: &mut dyn CompileNotifier,
    ) -> Vec<LinkAction> {
        let Some(origin) = direct_origin else {
            return Vec::new();
        };
        let kind = match effective_kind {
            Some(kind) if !kind.is_control() => kind,
            _ => return Vec::new(),
        };

        let name = self.next_pool_name();
        let identifier = format!("input_{}", self.next_socket_serial);
        self.next_socket_serial += 1;

        let mut socket = SocketDescriptor::new(kind, identifier.clone(), name.clone());
        socket.editable = true;
        socket.movable = true;
        socket.removable = true;
        socket.display.show_custom_name = true;
        socket.display.custom_name_input = true;
        if let Some(first) = self.permanent_inputs().next() {
            socket.display = first.display.clone();
        }
        socket.connection = Some(origin.clone());

        // The placeholder stays last and stays reusable.
        let placeholder_index = self.inputs.len() - 1;
        self.inputs.insert(placeholder_index, socket);

        log::debug!(
            "node '{}': synthesized input '{name}' ({}) from {origin:?}",
            self.id,
            kind.id_name()
        );
        self.setting_changed(notifier);

        vec![
            LinkAction::DropLinks {
                socket: SocketRef::new(self.id.clone(), PLACEHOLDER_IDENTIFIER),
            },
            LinkAction::Connect {
                from: origin,
                to: SocketRef::new(self.id.clone(), identifier),
            },
        ]
    }

    fn next_pool_name(&self) -> String {
        let used = self.inputs_by_custom_name();
        pool_names()
            .find(|name| !used.contains_key(name))
            .unwrap_or_else(|| "input".to_string())
    }

    /// Rename a permanent input. The new name must be non-empty and unique
    /// among this node's inputs; otherwise the edit is rejected and the
    /// original name retained.
    pub fn rename_input(
        &mut self,
        identifier: &str,
        name: &str,
        notifier: &mut dyn CompileNotifier,
    ) -> Result<(), SchemaError> {
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        let taken = self
            .permanent_inputs()
            .any(|socket| socket.identifier != identifier && socket.display_name == name);
        if taken {
            return Err(SchemaError::DuplicateName(name.to_string()));
        }

        let socket = crate::socket::find_mut(&mut self.inputs, identifier)
            .ok_or_else(|| SchemaError::UnknownSocket(identifier.to_string()))?;
        if !socket.editable {
            return Err(SchemaError::NotEditable(identifier.to_string()));
        }
        socket.display_name = name.to_string();
        self.setting_changed(notifier);
        Ok(())
    }

    /// Delete a permanent input and its links. Remaining inputs keep their
    /// names and identifiers.
    pub fn remove_input(
        &mut self,
        identifier: &str,
        notifier: &mut dyn CompileNotifier,
    ) -> Result<Vec<LinkAction>, SchemaError> {
        let index = self
            .inputs
            .iter()
            .position(|socket| socket.identifier == identifier)
            .ok_or_else(|| SchemaError::UnknownSocket(identifier.to_string()))?;
        if !self.inputs[index].removable {
            return Err(SchemaError::NotRemovable(identifier.to_string()));
        }

        self.inputs.remove(index);
        self.setting_changed(notifier);
        Ok(vec![LinkAction::DropLinks {
            socket: SocketRef::new(self.id.clone(), identifier),
        }])
    }
}

impl NodeLogic for ExpressionNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn inputs(&self) -> &[SocketDescriptor] {
        &self.inputs
    }

    fn outputs(&self) -> &[SocketDescriptor] {
        &self.outputs
    }

    // Expression inputs bind by display name: the names the user sees are the
    // variables the expression references.
    fn bound_input_names(&self) -> Vec<String> {
        self.permanent_inputs()
            .map(|socket| socket.display_name.clone())
            .collect()
    }

    fn contribute_code(&self, _bound: &[String]) -> Contribution {
        let trimmed = self.expression.trim();
        if trimmed.is_empty() || !self.syntax_valid {
            return Contribution::Inline(
                CodeFragment::new().bind(RESULT_IDENTIFIER, CodeExpr::Const(Value::Empty)),
            );
        }
        match Expr::parse(trimmed) {
            Ok(expr) => Contribution::Inline(
                CodeFragment::new().bind(RESULT_IDENTIFIER, CodeExpr::UserExpr(expr)),
            ),
            // syntax_valid is recomputed on every edit, so this only covers a
            // stale flag; degrade to the empty result rather than panic.
            Err(_) => Contribution::Inline(
                CodeFragment::new().bind(RESULT_IDENTIFIER, CodeExpr::Const(Value::Empty)),
            ),
        }
    }

    fn required_support_modules(&self) -> BTreeSet<&'static str> {
        BTreeSet::from([SUPPORT_MODULE])
    }
}
