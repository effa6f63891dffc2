//! Socket descriptors: named, typed slots on a node.

use kinema_api_core::{DataKind, Value};
use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Reference to a socket on some node, by stable identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    pub node: NodeId,
    pub socket: String,
}

impl SocketRef {
    pub fn new(node: impl Into<NodeId>, socket: impl Into<String>) -> Self {
        SocketRef {
            node: node.into(),
            socket: socket.into(),
        }
    }
}

/// Cosmetic settings the host UI reads when drawing a socket. The core only
/// copies them around; it never interprets them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketDisplay {
    pub show_custom_name: bool,
    pub custom_name_input: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SocketDescriptor {
    /// Stable key, unique within a node, never reused after removal.
    pub identifier: String,
    /// User-facing name; mutable, not used for binding on vectorized nodes.
    pub display_name: String,
    pub data_kind: DataKind,
    /// Whether this socket currently carries one value or an ordered sequence.
    #[serde(default)]
    pub is_sequence: bool,
    /// Upstream socket currently feeding this one, if any.
    #[serde(default)]
    pub connection: Option<SocketRef>,
    #[serde(default)]
    pub display: SocketDisplay,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub movable: bool,
    #[serde(default)]
    pub removable: bool,
}

impl SocketDescriptor {
    pub fn new(
        data_kind: DataKind,
        identifier: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        SocketDescriptor {
            identifier: identifier.into(),
            display_name: display_name.into(),
            data_kind,
            is_sequence: false,
            connection: None,
            display: SocketDisplay::default(),
            editable: false,
            movable: false,
            removable: false,
        }
    }

    pub fn sequence(mut self) -> Self {
        self.is_sequence = true;
        self
    }

    pub fn is_linked(&self) -> bool {
        self.connection.is_some()
    }

    /// Value an unconnected socket presents to the compiler.
    pub fn default_value(&self) -> Value {
        if self.is_sequence {
            Value::List(Vec::new())
        } else {
            self.data_kind.default_value()
        }
    }
}

/// Find a socket by identifier in a node's socket list.
pub fn find<'a>(sockets: &'a [SocketDescriptor], identifier: &str) -> Option<&'a SocketDescriptor> {
    sockets.iter().find(|s| s.identifier == identifier)
}

/// Mutable lookup by identifier.
pub fn find_mut<'a>(
    sockets: &'a mut [SocketDescriptor],
    identifier: &str,
) -> Option<&'a mut SocketDescriptor> {
    sockets.iter_mut().find(|s| s.identifier == identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::ValueKind;

    #[test]
    fn new_socket_is_unlinked_single() {
        let socket = SocketDescriptor::new(DataKind::Vector, "translation", "Translation");
        assert!(!socket.is_sequence);
        assert!(!socket.is_linked());
        assert_eq!(socket.default_value().kind(), ValueKind::Vec3);
    }

    #[test]
    fn sequence_socket_defaults_to_empty_list() {
        let socket = SocketDescriptor::new(DataKind::Vector, "translations", "Translations").sequence();
        assert_eq!(socket.default_value(), Value::List(Vec::new()));
    }

    #[test]
    fn find_by_identifier() {
        let sockets = vec![
            SocketDescriptor::new(DataKind::Vector, "a", "A"),
            SocketDescriptor::new(DataKind::Rotation, "b", "B"),
        ];
        assert_eq!(find(&sockets, "b").map(|s| s.data_kind), Some(DataKind::Rotation));
        assert!(find(&sockets, "c").is_none());
    }
}
