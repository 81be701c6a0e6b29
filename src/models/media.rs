use serde::{Deserialize, Serialize};

/// A media slot in the desired tree.
///
/// `Pending` holds bytes the editor has not uploaded yet; synchronization
/// uploads them and replaces the slot with `Durable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MediaRef {
    Durable { url: String },
    Pending(PendingFile),
}

impl MediaRef {
    pub fn durable(url: impl Into<String>) -> Self {
        MediaRef::Durable { url: url.into() }
    }

    pub fn pending(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        MediaRef::Pending(PendingFile {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        })
    }

    pub fn durable_url(&self) -> Option<&str> {
        match self {
            MediaRef::Durable { url } => Some(url),
            MediaRef::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MediaRef::Pending(_))
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFile {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
