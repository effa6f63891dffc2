//! Compose Transform: a vectorized node that bundles translation, rotation,
//! and scale into one transform, per element or in batch.

use crate::contribute::{CodeExpr, CodeFragment, Contribution, DelegatedCall, NodeLogic};
use crate::events::CompileNotifier;
use crate::socket::{NodeId, SocketDescriptor};
use crate::vectorize::{
    resolve, ExecutionVariant, GroupName, SocketFace, VectorizationSpec, VectorizedInput,
    VectorizedOutput,
};
use hashbrown::HashMap;
use kinema_api_core::{DataKind, SchemaError};
use std::collections::BTreeSet;

pub const USE_TRANSLATION_LIST: GroupName = "use_translation_list";
pub const USE_ROTATION_LIST: GroupName = "use_rotation_list";
pub const USE_SCALE_LIST: GroupName = "use_scale_list";

const SUPPORT_MODULE: &str = "transform_math";
const SCALAR_FUNCTION: &str = "compose_transform";
const BATCH_FUNCTION: &str = "compose_transform_list";

fn vectorization_spec() -> VectorizationSpec {
    VectorizationSpec {
        inputs: vec![
            VectorizedInput {
                group: USE_TRANSLATION_LIST,
                kind: DataKind::Vector,
                single: SocketFace::new("Translation", "translation"),
                sequence: SocketFace::new("Translations", "translations"),
            },
            VectorizedInput {
                group: USE_ROTATION_LIST,
                kind: DataKind::Rotation,
                single: SocketFace::new("Rotation", "rotation"),
                sequence: SocketFace::new("Rotations", "rotations"),
            },
            VectorizedInput {
                group: USE_SCALE_LIST,
                kind: DataKind::Vector,
                single: SocketFace::new("Scale", "scale"),
                sequence: SocketFace::new("Scales", "scales"),
            },
        ],
        outputs: vec![VectorizedOutput {
            kind: DataKind::Matrix,
            gating: vec![USE_TRANSLATION_LIST, USE_ROTATION_LIST, USE_SCALE_LIST],
            single: SocketFace::new("Matrix", "matrix"),
            sequence: SocketFace::new("Matrices", "matrices"),
        }],
    }
}

#[derive(Debug)]
pub struct ComposeTransformNode {
    id: NodeId,
    spec: VectorizationSpec,
    flags: HashMap<GroupName, bool>,
    inputs: Vec<SocketDescriptor>,
    outputs: Vec<SocketDescriptor>,
}

impl ComposeTransformNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        let spec = vectorization_spec();
        let flags: HashMap<GroupName, bool> =
            spec.groups().map(|group| (group, false)).collect();
        let mut node = ComposeTransformNode {
            id: id.into(),
            spec,
            flags,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        node.refresh();
        node
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

    pub fn list_mode(&self, group: &str) -> bool {
        self.flags.get(group).copied().unwrap_or(false)
    }

    /// Toggle one group's list mode and refresh socket cardinalities.
    pub fn set_list_mode(
        &mut self,
        group: &str,
        enabled: bool,
        notifier: &mut dyn CompileNotifier,
    ) -> Result<(), SchemaError> {
        let Some(flag) = self
            .spec
            .groups()
            .find(|candidate| *candidate == group)
        else {
            return Err(SchemaError::UnknownGroup(group.to_string()));
        };
        self.flags.insert(flag, enabled);
        self.refresh();
        log::debug!("node '{}': group '{group}' list mode set to {enabled}", self.id);
        notifier.execution_code_changed();
        Ok(())
    }

    /// Recompute socket presentations from the current flags. Idempotent.
    pub fn refresh(&mut self) {
        self.spec
            .refresh(&self.flags, &mut self.inputs, &mut self.outputs);
    }

    /// The execution variant of the single matrix output's gating relation.
    pub fn variant(&self) -> ExecutionVariant {
        resolve(&self.flags, &self.spec.outputs[0].gating)
    }
}

impl NodeLogic for ComposeTransformNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn inputs(&self) -> &[SocketDescriptor] {
        &self.inputs
    }

    fn outputs(&self) -> &[SocketDescriptor] {
        &self.outputs
    }

    fn bound_input_names(&self) -> Vec<String> {
        self.inputs
            .iter()
            .map(|socket| socket.identifier.clone())
            .collect()
    }

    fn contribute_code(&self, bound: &[String]) -> Contribution {
        debug_assert_eq!(bound.len(), self.inputs.len());
        match self.variant() {
            ExecutionVariant::Single => {
                let args = bound
                    .iter()
                    .map(|name| CodeExpr::Input(name.clone()))
                    .collect();
                Contribution::Inline(CodeFragment::new().bind(
                    self.outputs[0].identifier.clone(),
                    CodeExpr::Call {
                        module: SUPPORT_MODULE,
                        function: SCALAR_FUNCTION,
                        args,
                    },
                ))
            }
            ExecutionVariant::Sequence => Contribution::Delegated(DelegatedCall {
                function: BATCH_FUNCTION,
                inputs: bound.to_vec(),
                output: self.outputs[0].identifier.clone(),
            }),
        }
    }

    fn required_support_modules(&self) -> BTreeSet<&'static str> {
        BTreeSet::from([SUPPORT_MODULE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CountingNotifier;

    fn flag_names() -> [GroupName; 3] {
        [USE_TRANSLATION_LIST, USE_ROTATION_LIST, USE_SCALE_LIST]
    }

    #[test]
    fn all_flag_combinations_resolve_and_mark_the_output() {
        for bits in 0..8u8 {
            let mut node = ComposeTransformNode::new("compose");
            let mut notifier = CountingNotifier::default();
            for (i, group) in flag_names().iter().enumerate() {
                node.set_list_mode(group, bits & (1 << i) != 0, &mut notifier)
                    .expect("known group");
            }

            let expected = if bits == 0 {
                ExecutionVariant::Single
            } else {
                ExecutionVariant::Sequence
            };
            assert_eq!(node.variant(), expected, "flag bits {bits:03b}");
            assert_eq!(
                node.outputs()[0].is_sequence,
                expected == ExecutionVariant::Sequence,
                "flag bits {bits:03b}"
            );
        }
    }

    #[test]
    fn sequence_mode_swaps_socket_presentation() {
        let mut node = ComposeTransformNode::new("compose");
        let mut notifier = CountingNotifier::default();
        node.set_list_mode(USE_TRANSLATION_LIST, true, &mut notifier)
            .expect("known group");

        assert_eq!(node.inputs()[0].identifier, "translations");
        assert_eq!(node.inputs()[0].display_name, "Translations");
        assert!(node.inputs()[0].is_sequence);
        // Untouched groups keep their single-value presentation.
        assert_eq!(node.inputs()[1].identifier, "rotation");
        assert!(!node.inputs()[1].is_sequence);
        assert_eq!(node.outputs()[0].identifier, "matrices");
    }

    #[test]
    fn scalar_variant_contributes_inline_call() {
        let node = ComposeTransformNode::new("compose");
        let bound = node.bound_input_names();
        match node.contribute_code(&bound) {
            Contribution::Inline(fragment) => {
                assert_eq!(fragment.bindings.len(), 1);
                let (name, expr) = &fragment.bindings[0];
                assert_eq!(name, "matrix");
                match expr {
                    CodeExpr::Call {
                        module,
                        function,
                        args,
                    } => {
                        assert_eq!(*module, "transform_math");
                        assert_eq!(*function, "compose_transform");
                        assert_eq!(args.len(), 3);
                    }
                    other => panic!("expected call, got {:?}", other),
                }
            }
            other => panic!("expected inline contribution, got {:?}", other),
        }
    }

    #[test]
    fn any_list_flag_delegates_to_batch_function() {
        let mut node = ComposeTransformNode::new("compose");
        let mut notifier = CountingNotifier::default();
        node.set_list_mode(USE_SCALE_LIST, true, &mut notifier)
            .expect("known group");

        let bound = node.bound_input_names();
        match node.contribute_code(&bound) {
            Contribution::Delegated(call) => {
                assert_eq!(call.function, "compose_transform_list");
                assert_eq!(call.output, "matrices");
                assert_eq!(
                    call.inputs,
                    vec!["translation", "rotation", "scales"]
                );
            }
            other => panic!("expected delegated contribution, got {:?}", other),
        }
    }

    #[test]
    fn flag_changes_notify_the_host() {
        let mut node = ComposeTransformNode::new("compose");
        let mut notifier = CountingNotifier::default();
        node.set_list_mode(USE_ROTATION_LIST, true, &mut notifier)
            .expect("known group");
        node.set_list_mode(USE_ROTATION_LIST, false, &mut notifier)
            .expect("known group");
        assert_eq!(notifier.count, 2);
    }

    #[test]
    fn unknown_group_is_rejected() {
        let mut node = ComposeTransformNode::new("compose");
        let mut notifier = CountingNotifier::default();
        assert_eq!(
            node.set_list_mode("use_nope_list", true, &mut notifier),
            Err(SchemaError::UnknownGroup("use_nope_list".to_string()))
        );
        assert_eq!(notifier.count, 0);
    }

    #[test]
    fn repeated_refresh_does_not_drift() {
        let mut node = ComposeTransformNode::new("compose");
        let mut notifier = CountingNotifier::default();
        node.set_list_mode(USE_TRANSLATION_LIST, true, &mut notifier)
            .expect("known group");
        let inputs = node.inputs().to_vec();
        let outputs = node.outputs().to_vec();
        node.refresh();
        node.refresh();
        assert_eq!(node.inputs(), &inputs[..]);
        assert_eq!(node.outputs(), &outputs[..]);
    }

    #[test]
    fn requires_the_transform_math_module() {
        let node = ComposeTransformNode::new("compose");
        assert!(node
            .required_support_modules()
            .contains("transform_math"));
    }
}
