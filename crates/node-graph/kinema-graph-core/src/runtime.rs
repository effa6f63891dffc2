//! Reference consumer of node contributions.
//!
//! The full graph compiler (topological scheduling, cross-node assembly)
//! lives host-side; this module is the minimal runtime that executes what
//! nodes contribute, so the protocol can be exercised end to end. Hosts with
//! their own compiler only need the same two pieces: a [`SupportRegistry`]
//! providing the declared support modules, and per-node error capture.
//!
//! Every failure is node-scoped. A node that cannot execute publishes empty
//! outputs and a message in [`GraphRuntime::node_errors`]; unrelated nodes in
//! the same run evaluate normally.

use crate::batch::BatchRegistry;
use crate::contribute::{CodeExpr, CodeFragment, Contribution, DelegatedCall, NodeLogic};
use crate::expr::{Bindings, FnRegistry};
use crate::nodes::GraphNode;
use crate::socket::{NodeId, SocketRef};
use hashbrown::{HashMap, HashSet};
use kinema_api_core::Value;

/// A pure function exported by a support module.
pub type SupportFn = fn(&[Value]) -> Result<Value, String>;

/// Named support modules available to contributed code, plus the expression
/// whitelist backing guarded user expressions.
#[derive(Clone, Default)]
pub struct SupportRegistry {
    modules: HashSet<&'static str>,
    call_fns: HashMap<(&'static str, &'static str), SupportFn>,
    expr_fns: FnRegistry,
}

impl SupportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a module, making the module available.
    pub fn register(&mut self, module: &'static str, function: &'static str, func: SupportFn) {
        self.modules.insert(module);
        self.call_fns.insert((module, function), func);
    }

    /// Install the expression whitelist; provides the `expr_std` module.
    pub fn with_expr_fns(mut self, registry: FnRegistry) -> Self {
        self.modules.insert("expr_std");
        self.expr_fns = registry;
        self
    }

    /// The standard setup: transform math plus the expression whitelist.
    pub fn standard() -> Self {
        let mut registry = SupportRegistry::new().with_expr_fns(FnRegistry::standard());
        registry.register("transform_math", "compose_transform", compose_transform);
        registry
    }

    pub fn provides_module(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn expr_fns(&self) -> &FnRegistry {
        &self.expr_fns
    }

    fn call(
        &self,
        module: &'static str,
        function: &'static str,
        args: &[Value],
    ) -> Result<Value, String> {
        let func = self
            .call_fns
            .get(&(module, function))
            .ok_or_else(|| format!("support module '{module}' has no function '{function}'"))?;
        func(args)
    }
}

/// Compose one transform from one translation, one rotation, and one scale.
/// Empty arguments fall back to the identity components.
fn compose_transform(args: &[Value]) -> Result<Value, String> {
    let translation = match args.first() {
        Some(Value::Vec3(v)) => *v,
        Some(Value::Empty) | None => [0.0; 3],
        Some(other) => return Err(wrong_component("translation", "Vector", other)),
    };
    let rotation = match args.get(1) {
        Some(Value::Euler(v)) => *v,
        Some(Value::Empty) | None => [0.0; 3],
        Some(other) => return Err(wrong_component("rotation", "Rotation", other)),
    };
    let scale = match args.get(2) {
        Some(Value::Vec3(v)) => *v,
        Some(Value::Empty) | None => [1.0; 3],
        Some(other) => return Err(wrong_component("scale", "Vector", other)),
    };
    Ok(Value::transform(translation, rotation, scale))
}

fn wrong_component(name: &str, expected: &str, got: &Value) -> String {
    format!(
        "compose_transform {name} must be a {expected}, got {:?}",
        got.kind()
    )
}

/// Runtime state shared by all node evaluations within one graph run.
#[derive(Default)]
pub struct GraphRuntime {
    pub support: SupportRegistry,
    pub batches: BatchRegistry,
    /// Values staged by the host for sockets fed from outside the compiled
    /// graph, keyed by the upstream socket reference.
    pub staged: HashMap<SocketRef, Value>,
    /// Per-node output maps, keyed by binding name.
    pub outputs: HashMap<NodeId, HashMap<String, Value>>,
    /// Node-scoped failure messages from the most recent run.
    pub node_errors: HashMap<NodeId, String>,
}

impl GraphRuntime {
    /// Runtime with the standard support modules and batch functions.
    pub fn standard() -> Self {
        GraphRuntime {
            support: SupportRegistry::standard(),
            batches: BatchRegistry::standard(),
            ..Default::default()
        }
    }

    /// Stage a value for a socket reference that no node in this run
    /// produces.
    pub fn stage(&mut self, socket: SocketRef, value: Value) {
        self.staged.insert(socket, value);
    }

    /// Output `socket` of `node` from the most recent run, if present.
    pub fn output(&self, node: &str, socket: &str) -> Option<&Value> {
        self.outputs.get(node).and_then(|map| map.get(socket))
    }

    fn upstream_value(&self, origin: &SocketRef) -> Option<Value> {
        if let Some(value) = self
            .outputs
            .get(&origin.node)
            .and_then(|map| map.get(&origin.socket))
        {
            return Some(value.clone());
        }
        self.staged.get(origin).cloned()
    }
}

/// Evaluate every node, in the caller-supplied (topological) order.
///
/// Nodes are mutated only to capture their own evaluation errors; all other
/// state flows through `rt`.
pub fn evaluate_all(rt: &mut GraphRuntime, nodes: &mut [GraphNode]) {
    rt.outputs.clear();
    rt.node_errors.clear();
    for node in nodes.iter_mut() {
        evaluate_node(rt, node);
    }
}

fn evaluate_node(rt: &mut GraphRuntime, node: &mut GraphNode) {
    let id = node.id().to_string();
    let bound = node.bound_input_names();
    node.clear_runtime_error();

    for module in node.required_support_modules() {
        if !rt.support.provides_module(module) {
            fail(rt, node, &id, format!("support module '{module}' is not available"));
            return;
        }
    }

    let bindings = collect_bindings(rt, node, &bound);
    match node.contribute_code(&bound) {
        Contribution::Inline(fragment) => {
            let available: HashSet<String> = bound.iter().cloned().collect();
            if let Err(err) = fragment.validate(&available) {
                fail(rt, node, &id, err.to_string());
                return;
            }
            execute_inline(rt, node, &id, fragment, &bindings);
        }
        Contribution::Delegated(call) => execute_delegated(rt, node, &id, call, &bindings),
    }
}

fn collect_bindings(rt: &GraphRuntime, node: &GraphNode, bound: &[String]) -> Bindings {
    let bindable = node
        .inputs()
        .iter()
        .filter(|socket| !socket.data_kind.is_control());
    bindable
        .zip(bound.iter())
        .map(|(socket, name)| {
            let value = socket
                .connection
                .as_ref()
                .and_then(|origin| rt.upstream_value(origin))
                .unwrap_or_else(|| socket.default_value());
            (name.clone(), value)
        })
        .collect()
}

fn execute_inline(
    rt: &mut GraphRuntime,
    node: &mut GraphNode,
    id: &str,
    fragment: CodeFragment,
    bindings: &Bindings,
) {
    let mut outputs: HashMap<String, Value> = HashMap::with_capacity(fragment.bindings.len());
    for (name, expr) in fragment.bindings {
        let value = match expr {
            // Guarded: a failing user expression yields an empty value and a
            // node-local message; the run itself is unaffected.
            CodeExpr::UserExpr(user) => match user.eval(bindings, rt.support.expr_fns()) {
                Ok(value) => value,
                Err(err) => {
                    node.record_runtime_error(&err.to_string());
                    Value::Empty
                }
            },
            other => match eval_code_expr(rt, &other, bindings) {
                Ok(value) => value,
                Err(message) => {
                    rt.node_errors.insert(id.to_string(), message);
                    Value::Empty
                }
            },
        };
        outputs.insert(name, value);
    }
    rt.outputs.insert(id.to_string(), outputs);
}

fn eval_code_expr(
    rt: &GraphRuntime,
    expr: &CodeExpr,
    bindings: &Bindings,
) -> Result<Value, String> {
    match expr {
        CodeExpr::Const(value) => Ok(value.clone()),
        CodeExpr::Input(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no binding for input '{name}'")),
        CodeExpr::Call {
            module,
            function,
            args,
        } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_code_expr(rt, arg, bindings)?);
            }
            rt.support.call(*module, *function, &values)
        }
        CodeExpr::UserExpr(user) => user
            .eval(bindings, rt.support.expr_fns())
            .map_err(|err| err.to_string()),
    }
}

fn execute_delegated(
    rt: &mut GraphRuntime,
    node: &mut GraphNode,
    id: &str,
    call: DelegatedCall,
    bindings: &Bindings,
) {
    let Some(batch) = rt.batches.get(call.function) else {
        fail(rt, node, id, format!("no batch function '{}'", call.function));
        return;
    };

    let mut args = Vec::with_capacity(call.inputs.len());
    for input in &call.inputs {
        match bindings.get(input) {
            Some(value) => args.push(value.clone()),
            None => {
                fail(rt, node, id, format!("no binding for input '{input}'"));
                return;
            }
        }
    }

    let mut outputs = HashMap::with_capacity(1);
    match batch(&args) {
        Ok(value) => {
            outputs.insert(call.output, value);
        }
        Err(err) => {
            // A broadcast mismatch is a hard error for this invocation: no
            // partial result is published.
            outputs.insert(call.output, Value::Empty);
            rt.node_errors.insert(id.to_string(), err.to_string());
        }
    }
    rt.outputs.insert(id.to_string(), outputs);
}

fn fail(rt: &mut GraphRuntime, node: &GraphNode, id: &str, message: String) {
    log::debug!("node '{id}' failed: {message}");
    let outputs: HashMap<String, Value> = node
        .outputs()
        .iter()
        .map(|socket| (socket.identifier.clone(), Value::Empty))
        .collect();
    rt.outputs.insert(id.to_string(), outputs);
    rt.node_errors.insert(id.to_string(), message);
}
