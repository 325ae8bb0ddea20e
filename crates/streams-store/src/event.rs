//! Record descriptors returned to the enclosing key/value store.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// What produced an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A record was appended.
    Create,

    /// A record or the stream tail was read.
    Get,
}

/// Externally visible node carried by an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExtern {
    /// Node path.
    pub key: String,

    /// Record payload, or the hexadecimal tail for `info` reads. Serialized as
    /// a base64 string.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_value")]
    pub value: Option<Bytes>,

    /// Always zero; streams do not take part in the store's revision index.
    pub modified_index: u64,

    /// Always zero; streams do not take part in the store's revision index.
    pub created_index: u64,
}

/// Result of a streams store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Operation that produced the event.
    pub action: Action,

    /// Node the operation touched.
    pub node: NodeExtern,
}

impl Event {
    pub(crate) const fn created(key: String) -> Self {
        Self {
            action: Action::Create,
            node: NodeExtern {
                key,
                value: None,
                modified_index: 0,
                created_index: 0,
            },
        }
    }

    pub(crate) const fn got(key: String, value: Bytes) -> Self {
        Self {
            action: Action::Get,
            node: NodeExtern {
                key,
                value: Some(value),
                modified_index: 0,
                created_index: 0,
            },
        }
    }

    /// The node value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Bytes> {
        self.node.value.as_ref()
    }
}

mod base64_value {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
