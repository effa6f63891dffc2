//! Broadcast rules and batch functions for list-mode execution.
//!
//! A delegated batch function receives the full input sequences at once. Each
//! argument is either a `Value::List` or a bare scalar standing in for a
//! constant-repeated sequence. The output length is the longest input;
//! length-1 sequences and scalars broadcast; two sequences of unequal length
//! greater than one are a usage error, never truncated or padded.

use hashbrown::HashMap;
use kinema_api_core::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("cannot broadcast sequences of lengths {left} and {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("{function} expects {expected}, got a {got} element")]
    ElementType {
        function: &'static str,
        expected: &'static str,
        got: &'static str,
    },
}

/// Resolve the aggregated output length for a set of batch arguments.
pub fn broadcast_len(args: &[Value]) -> Result<usize, BatchError> {
    let mut resolved: Option<usize> = None;
    for len in args.iter().filter_map(Value::seq_len) {
        if len == 1 {
            continue;
        }
        match resolved {
            None => resolved = Some(len),
            Some(existing) if existing == len => {}
            Some(existing) => {
                return Err(BatchError::LengthMismatch {
                    left: existing,
                    right: len,
                })
            }
        }
    }
    Ok(resolved.unwrap_or(1))
}

/// Element `i` of a batch argument, broadcasting scalars and length-1 lists.
pub fn element(arg: &Value, i: usize) -> Value {
    match arg {
        Value::List(items) if items.len() == 1 => items[0].clone(),
        Value::List(items) => items.get(i).cloned().unwrap_or(Value::Empty),
        scalar => scalar.clone(),
    }
}

/// A batch implementation the compiler can delegate to by name.
pub type BatchFn = fn(&[Value]) -> Result<Value, BatchError>;

/// Registry mapping delegated function names to implementations.
#[derive(Clone, Default)]
pub struct BatchRegistry {
    funcs: HashMap<&'static str, BatchFn>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, func: BatchFn) {
        self.funcs.insert(name, func);
    }

    pub fn get(&self, name: &str) -> Option<BatchFn> {
        self.funcs.get(name).copied()
    }

    /// Registry with the built-in batch functions.
    pub fn standard() -> Self {
        let mut registry = BatchRegistry::new();
        registry.register("compose_transform_list", compose_transform_list);
        registry
    }
}

fn vec3_element(value: Value, fallback: [f32; 3]) -> Result<[f32; 3], BatchError> {
    match value {
        Value::Vec3(v) => Ok(v),
        Value::Empty => Ok(fallback),
        other => Err(BatchError::ElementType {
            function: "compose_transform_list",
            expected: "Vector",
            got: kind_name(&other),
        }),
    }
}

fn euler_element(value: Value, fallback: [f32; 3]) -> Result<[f32; 3], BatchError> {
    match value {
        Value::Euler(v) => Ok(v),
        Value::Empty => Ok(fallback),
        other => Err(BatchError::ElementType {
            function: "compose_transform_list",
            expected: "Rotation",
            got: kind_name(&other),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Float(_) => "Float",
        Value::Vec3(_) => "Vector",
        Value::Euler(_) => "Rotation",
        Value::Transform { .. } => "Matrix",
        Value::Text(_) => "Text",
        Value::List(_) => "List",
        Value::Empty => "Empty",
    }
}

/// Compose one transform per element from translation, rotation, and scale
/// sequences. Empty elements fall back to the identity components.
pub fn compose_transform_list(args: &[Value]) -> Result<Value, BatchError> {
    let translations = args.first().cloned().unwrap_or(Value::Empty);
    let rotations = args.get(1).cloned().unwrap_or(Value::Empty);
    let scales = args.get(2).cloned().unwrap_or(Value::Empty);

    let len = broadcast_len(args)?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let translation = vec3_element(element(&translations, i), [0.0; 3])?;
        let rotation = euler_element(element(&rotations, i), [0.0; 3])?;
        let scale = vec3_element(element(&scales, i), [1.0; 3])?;
        out.push(Value::transform(translation, rotation, scale));
    }
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec3_list(count: usize) -> Value {
        Value::List(
            (0..count)
                .map(|i| Value::vec3(i as f32, 0.0, 0.0))
                .collect(),
        )
    }

    fn euler_list(count: usize) -> Value {
        Value::List((0..count).map(|_| Value::euler(0.0, 0.0, 0.0)).collect())
    }

    #[test]
    fn broadcast_takes_max_length() {
        let args = [vec3_list(3), euler_list(1), vec3_list(3)];
        assert_eq!(broadcast_len(&args), Ok(3));
    }

    #[test]
    fn scalars_broadcast_to_one() {
        let args = [Value::vec3(0.0, 0.0, 0.0), Value::euler(0.0, 0.0, 0.0)];
        assert_eq!(broadcast_len(&args), Ok(1));
    }

    #[test]
    fn unequal_lengths_error() {
        let args = [vec3_list(3), euler_list(2)];
        assert_eq!(
            broadcast_len(&args),
            Err(BatchError::LengthMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn compose_broadcasts_short_inputs() {
        let args = [vec3_list(3), euler_list(1), vec3_list(3)];
        let result = compose_transform_list(&args).expect("composes");
        match result {
            Value::List(items) => {
                assert_eq!(items.len(), 3);
                match &items[2] {
                    Value::Transform { translation, .. } => {
                        assert_eq!(translation, &[2.0, 0.0, 0.0])
                    }
                    other => panic!("expected transform, got {:?}", other),
                }
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn compose_accepts_bare_scalars_as_constants() {
        let args = [vec3_list(2), Value::euler(0.1, 0.2, 0.3), vec3_list(2)];
        let result = compose_transform_list(&args).expect("composes");
        match result {
            Value::List(items) => {
                assert_eq!(items.len(), 2);
                for item in &items {
                    match item {
                        Value::Transform { rotation, .. } => {
                            assert_eq!(rotation, &[0.1, 0.2, 0.3])
                        }
                        other => panic!("expected transform, got {:?}", other),
                    }
                }
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn compose_mismatch_produces_no_partial_result() {
        let args = [vec3_list(3), euler_list(2), vec3_list(3)];
        assert_eq!(
            compose_transform_list(&args),
            Err(BatchError::LengthMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn compose_fills_empty_elements_with_identity() {
        let args = [Value::Empty, Value::Empty, Value::Empty];
        let result = compose_transform_list(&args).expect("composes");
        assert_eq!(
            result,
            Value::List(vec![Value::transform([0.0; 3], [0.0; 3], [1.0; 3])])
        );
    }

    #[test]
    fn wrong_element_kind_errors() {
        let args = [Value::f(1.0), euler_list(1), vec3_list(1)];
        assert!(matches!(
            compose_transform_list(&args),
            Err(BatchError::ElementType { .. })
        ));
    }
}
