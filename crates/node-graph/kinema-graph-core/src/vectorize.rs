//! Vectorization: choosing the single-value or sequence execution variant.
//!
//! A vectorized node declares one list-mode flag per logical input group and,
//! per output, the set of groups that gate that output's cardinality. The
//! resolver is a total function over the flags; resolving never fails and
//! re-resolving with unchanged flags is a no-op.

use crate::socket::SocketDescriptor;
use hashbrown::HashMap;
use kinema_api_core::DataKind;
use serde::{Deserialize, Serialize};

/// Logical input-group name, declared statically per node type.
pub type GroupName = &'static str;

/// The two execution shapes a vectorized node may take.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionVariant {
    Single,
    Sequence,
}

/// Decide the execution variant for one output-gating relation.
///
/// `Sequence` iff any gating group's flag is currently true; a flag missing
/// from the map counts as false. Each gating relation is resolved
/// independently, so a node may carry several vectorizable outputs without
/// cross-contamination.
pub fn resolve(flags: &HashMap<GroupName, bool>, gating: &[GroupName]) -> ExecutionVariant {
    if gating
        .iter()
        .any(|group| flags.get(group).copied().unwrap_or(false))
    {
        ExecutionVariant::Sequence
    } else {
        ExecutionVariant::Single
    }
}

/// The (display name, identifier) pair a socket presents in one mode.
#[derive(Copy, Clone, Debug)]
pub struct SocketFace {
    pub display_name: &'static str,
    pub identifier: &'static str,
}

impl SocketFace {
    pub const fn new(display_name: &'static str, identifier: &'static str) -> Self {
        SocketFace {
            display_name,
            identifier,
        }
    }
}

/// One logical input group that presents either a single-value socket or a
/// sequence socket depending on its flag.
#[derive(Clone, Debug)]
pub struct VectorizedInput {
    pub group: GroupName,
    pub kind: DataKind,
    pub single: SocketFace,
    pub sequence: SocketFace,
}

/// One output socket whose cardinality is the OR over its gating groups.
#[derive(Clone, Debug)]
pub struct VectorizedOutput {
    pub kind: DataKind,
    pub gating: Vec<GroupName>,
    pub single: SocketFace,
    pub sequence: SocketFace,
}

/// Complete vectorization description for a node type.
#[derive(Clone, Debug, Default)]
pub struct VectorizationSpec {
    pub inputs: Vec<VectorizedInput>,
    pub outputs: Vec<VectorizedOutput>,
}

impl VectorizationSpec {
    /// All declared group names, in input order.
    pub fn groups(&self) -> impl Iterator<Item = GroupName> + '_ {
        self.inputs.iter().map(|input| input.group)
    }

    /// Rebuild the node's socket lists for the given flag assignment.
    ///
    /// Connections survive on sockets whose identifier is unchanged by the
    /// refresh; a socket that swaps presentation loses its link, which the
    /// host re-establishes through its own conversion rules. This is purely a
    /// metadata update, not an execution.
    pub fn refresh(
        &self,
        flags: &HashMap<GroupName, bool>,
        inputs: &mut Vec<SocketDescriptor>,
        outputs: &mut Vec<SocketDescriptor>,
    ) {
        let previous_inputs = std::mem::take(inputs);
        *inputs = self
            .inputs
            .iter()
            .map(|input| {
                let sequence = flags.get(input.group).copied().unwrap_or(false);
                let face = if sequence { input.sequence } else { input.single };
                rebuild(&previous_inputs, face, input.kind, sequence)
            })
            .collect();

        let previous_outputs = std::mem::take(outputs);
        *outputs = self
            .outputs
            .iter()
            .map(|output| {
                let variant = resolve(flags, &output.gating);
                let sequence = variant == ExecutionVariant::Sequence;
                let face = if sequence { output.sequence } else { output.single };
                rebuild(&previous_outputs, face, output.kind, sequence)
            })
            .collect();
    }
}

fn rebuild(
    existing: &[SocketDescriptor],
    face: SocketFace,
    kind: DataKind,
    sequence: bool,
) -> SocketDescriptor {
    let mut socket = SocketDescriptor::new(kind, face.identifier, face.display_name);
    socket.is_sequence = sequence;
    socket.connection = existing
        .iter()
        .find(|s| s.identifier == face.identifier)
        .and_then(|s| s.connection.clone());
    socket
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SocketRef;

    fn flags(pairs: &[(GroupName, bool)]) -> HashMap<GroupName, bool> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn resolve_is_or_over_gating_groups() {
        let gating: Vec<GroupName> = vec!["a", "b", "c"];
        for bits in 0..8u8 {
            let f = flags(&[
                ("a", bits & 1 != 0),
                ("b", bits & 2 != 0),
                ("c", bits & 4 != 0),
            ]);
            let expected = if bits == 0 {
                ExecutionVariant::Single
            } else {
                ExecutionVariant::Sequence
            };
            assert_eq!(resolve(&f, &gating), expected, "flag bits {bits:03b}");
        }
    }

    #[test]
    fn missing_flags_count_as_false() {
        assert_eq!(
            resolve(&HashMap::new(), &["a", "b"]),
            ExecutionVariant::Single
        );
    }

    fn two_group_spec() -> VectorizationSpec {
        VectorizationSpec {
            inputs: vec![
                VectorizedInput {
                    group: "use_left_list",
                    kind: DataKind::Vector,
                    single: SocketFace::new("Left", "left"),
                    sequence: SocketFace::new("Lefts", "lefts"),
                },
                VectorizedInput {
                    group: "use_right_list",
                    kind: DataKind::Vector,
                    single: SocketFace::new("Right", "right"),
                    sequence: SocketFace::new("Rights", "rights"),
                },
            ],
            outputs: vec![
                VectorizedOutput {
                    kind: DataKind::Vector,
                    gating: vec!["use_left_list"],
                    single: SocketFace::new("Left Out", "left_out"),
                    sequence: SocketFace::new("Left Outs", "left_outs"),
                },
                VectorizedOutput {
                    kind: DataKind::Vector,
                    gating: vec!["use_right_list"],
                    single: SocketFace::new("Right Out", "right_out"),
                    sequence: SocketFace::new("Right Outs", "right_outs"),
                },
            ],
        }
    }

    #[test]
    fn independent_gates_do_not_cross_contaminate() {
        let spec = two_group_spec();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        spec.refresh(
            &flags(&[("use_left_list", true), ("use_right_list", false)]),
            &mut inputs,
            &mut outputs,
        );

        assert_eq!(inputs[0].identifier, "lefts");
        assert!(inputs[0].is_sequence);
        assert_eq!(inputs[1].identifier, "right");
        assert!(!inputs[1].is_sequence);

        assert_eq!(outputs[0].identifier, "left_outs");
        assert!(outputs[0].is_sequence);
        assert_eq!(outputs[1].identifier, "right_out");
        assert!(!outputs[1].is_sequence);
    }

    #[test]
    fn refresh_is_idempotent() {
        let spec = two_group_spec();
        let f = flags(&[("use_left_list", true), ("use_right_list", true)]);
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        spec.refresh(&f, &mut inputs, &mut outputs);
        let (first_in, first_out) = (inputs.clone(), outputs.clone());
        spec.refresh(&f, &mut inputs, &mut outputs);
        assert_eq!(inputs, first_in);
        assert_eq!(outputs, first_out);
    }

    #[test]
    fn refresh_preserves_connection_on_unchanged_identifier() {
        let spec = two_group_spec();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        spec.refresh(&flags(&[]), &mut inputs, &mut outputs);
        inputs[1].connection = Some(SocketRef::new("upstream", "out"));

        // Toggling only the left group keeps the right socket's link.
        spec.refresh(&flags(&[("use_left_list", true)]), &mut inputs, &mut outputs);
        assert_eq!(inputs[0].identifier, "lefts");
        assert!(inputs[0].connection.is_none());
        assert_eq!(
            inputs[1].connection,
            Some(SocketRef::new("upstream", "out"))
        );
    }
}
