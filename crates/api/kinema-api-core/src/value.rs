//! Value: runtime instances exchanged between node sockets.
//! All numeric components use f32, matching the host engine.

use serde::{Deserialize, Serialize};

/// Lightweight kind enum for pattern-matching and quick dispatch without
/// inspecting full payloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Vec3,
    Euler,
    Transform,
    Text,
    List,
    Empty,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// 3D vector
    Vec3([f32; 3]),

    /// Euler rotation in radians, XYZ order by host convention
    Euler([f32; 3]),

    /// Composed transform. A structural bundle of its parts; the host's math
    /// layer owns matrix conversion.
    Transform {
        translation: [f32; 3],
        rotation: [f32; 3],
        scale: [f32; 3],
    },

    /// Text / string
    Text(String),

    /// Ordered sequence of values
    List(Vec<Value>),

    /// Absent result, e.g. from a skipped or failed evaluation
    Empty,
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Euler(_) => ValueKind::Euler,
            Value::Transform { .. } => ValueKind::Transform,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Empty => ValueKind::Empty,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn euler(x: f32, y: f32, z: f32) -> Self {
        Value::Euler([x, y, z])
    }

    pub fn transform(translation: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Value::Transform {
            translation,
            rotation,
            scale,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Sequence length when this value is a list; `None` for scalars, which
    /// broadcast during batch execution.
    pub fn seq_len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::f(1.0).kind(), ValueKind::Float);
        assert_eq!(Value::vec3(0.0, 1.0, 2.0).kind(), ValueKind::Vec3);
        assert_eq!(
            Value::transform([0.0; 3], [0.0; 3], [1.0; 3]).kind(),
            ValueKind::Transform
        );
        assert_eq!(Value::Empty.kind(), ValueKind::Empty);
    }

    #[test]
    fn seq_len_only_for_lists() {
        assert_eq!(Value::List(vec![Value::f(1.0), Value::f(2.0)]).seq_len(), Some(2));
        assert_eq!(Value::f(1.0).seq_len(), None);
    }

    #[test]
    fn transform_roundtrips_via_json() {
        let value = Value::transform([1.0, 2.0, 3.0], [0.0, 0.5, 0.0], [1.0, 1.0, 1.0]);
        let json = serde_json::to_string(&value).expect("serialize");
        let parsed: Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value, parsed);
    }

    #[test]
    fn list_roundtrips_via_json() {
        let value = Value::List(vec![Value::f(1.0), Value::vec3(1.0, 2.0, 3.0), Value::Empty]);
        let json = serde_json::to_string(&value).expect("serialize");
        let parsed: Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value, parsed);
    }
}
