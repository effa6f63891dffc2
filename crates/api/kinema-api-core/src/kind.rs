//! Data-kind tags and the socket-type registry.
//!
//! `DataKind` is the closed set of tags a socket can carry. The registry
//! functions stand in for the host's socket-construction table: `id_name`
//! yields the constructible socket type for a kind, `default_value` the value
//! an unconnected socket of that kind presents.

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Vector,
    Rotation,
    Matrix,
    Generic,
    /// Placeholder-only kind; never carries data and never binds.
    Control,
}

impl DataKind {
    /// Constructible socket type identifier for this kind.
    pub fn id_name(self) -> &'static str {
        match self {
            DataKind::Vector => "VectorSocket",
            DataKind::Rotation => "RotationSocket",
            DataKind::Matrix => "MatrixSocket",
            DataKind::Generic => "GenericSocket",
            DataKind::Control => "ControlSocket",
        }
    }

    /// Value presented by an unconnected single-value socket of this kind.
    pub fn default_value(self) -> Value {
        match self {
            DataKind::Vector => Value::Vec3([0.0; 3]),
            DataKind::Rotation => Value::Euler([0.0; 3]),
            DataKind::Matrix => Value::transform([0.0; 3], [0.0; 3], [1.0; 3]),
            DataKind::Generic | DataKind::Control => Value::Empty,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, DataKind::Control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn id_names_are_distinct() {
        let names = [
            DataKind::Vector.id_name(),
            DataKind::Rotation.id_name(),
            DataKind::Matrix.id_name(),
            DataKind::Generic.id_name(),
            DataKind::Control.id_name(),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn defaults_match_kind() {
        assert_eq!(DataKind::Vector.default_value().kind(), ValueKind::Vec3);
        assert_eq!(DataKind::Rotation.default_value().kind(), ValueKind::Euler);
        assert_eq!(DataKind::Matrix.default_value().kind(), ValueKind::Transform);
        assert!(DataKind::Generic.default_value().is_empty());
    }

    #[test]
    fn matrix_default_has_unit_scale() {
        match DataKind::Matrix.default_value() {
            Value::Transform { scale, .. } => assert_eq!(scale, [1.0; 3]),
            other => panic!("expected transform, got {:?}", other),
        }
    }
}
