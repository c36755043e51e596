//! Upload types for the init / transfer / finalize protocol

use std::fmt;

use serde_json::{Map, Value};

use crate::digest::{FileDigest, MetadataDigest};

// ============================================================================
// Constants
// ============================================================================

/// Param carrying the storage key, required in every init response
pub const STORAGE_KEY_PARAM: &str = "key";

/// Statuses accepted from the catalog service
pub const CATALOG_SUCCESS: [u16; 2] = [200, 201];

/// The only status the storage endpoint may answer with
pub const STORAGE_SUCCESS: u16 = 204;

// ============================================================================
// Phases
// ============================================================================

/// One of the three network exchanges of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Transfer,
    Finalize,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Transfer => "transfer",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Init Types
// ============================================================================

/// Direct-to-storage upload target returned by init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDestination {
    pub url: String,

    /// Form fields to echo to storage, in response order
    pub params: Vec<(String, String)>,

    /// Value of the `key` param, echoed again at finalize
    pub key: String,
}

impl StorageDestination {
    /// Validate a parsed init body; the error names what is missing
    pub fn from_init_body(body: &Value) -> Result<Self, &'static str> {
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .ok_or("response missing `url`")?;
        let params = body
            .get("params")
            .and_then(Value::as_object)
            .ok_or("response missing `params`")?;

        let params = render_params(params);
        let key = params
            .iter()
            .find(|(name, _)| name == STORAGE_KEY_PARAM)
            .map(|(_, value)| value.clone())
            .ok_or("params missing `key`")?;

        Ok(Self {
            url: url.to_string(),
            params,
            key,
        })
    }
}

/// Strings pass through, everything else is rendered as JSON text
fn render_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

// ============================================================================
// Finalize Types
// ============================================================================

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Identifier assigned by the catalog service, as the JSON it arrived in
    pub id: Value,

    /// Storage key the book was uploaded under
    pub key: String,

    pub file_digest: String,
    pub metadata_digest: String,
}

impl UploadReceipt {
    pub fn new(id: Value, key: String, file_digest: &FileDigest, metadata_digest: &MetadataDigest) -> Self {
        Self {
            id,
            key,
            file_digest: file_digest.to_string(),
            metadata_digest: metadata_digest.to_string(),
        }
    }

    /// The identifier as text: strings unquoted, anything else as JSON
    pub fn id_text(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }
}

/// Pull the remote identifier out of a finalize body, keeping its JSON type
pub fn remote_id(body: &Value) -> Option<Value> {
    body.get("id").filter(|id| !id.is_null()).cloned()
}

// ============================================================================
// Session State
// ============================================================================

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub cause: String,
}

/// Upload session state.
///
/// `Created -> Initialized -> Uploaded -> Finalized`; any phase may end in
/// `Failed`. A failed session leaves whatever the service already created
/// behind.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Created,
    Initialized(StorageDestination),
    Uploaded(StorageDestination),
    Finalized(UploadReceipt),
    Failed(PhaseFailure),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initialized(_) => "initialized",
            Self::Uploaded(_) => "uploaded",
            Self::Finalized(_) => "finalized",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized(_) | Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_destination_keeps_param_order() {
        let body = json!({
            "url": "https://bucket.s3.amazonaws.com/",
            "params": {
                "key": "uploads/abc/book.epub",
                "policy": "eyJ...",
                "x-amz-signature": "f00",
                "success_action_status": 204
            }
        });

        let destination = StorageDestination::from_init_body(&body).unwrap();
        assert_eq!(destination.key, "uploads/abc/book.epub");
        let names: Vec<_> = destination.params.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["key", "policy", "x-amz-signature", "success_action_status"]);
        assert_eq!(destination.params[3].1, "204");
    }

    #[test]
    fn test_destination_requires_fields() {
        assert_eq!(
            StorageDestination::from_init_body(&json!({"url": "https://x"})),
            Err("response missing `params`")
        );
        assert_eq!(
            StorageDestination::from_init_body(&json!({"params": {"key": "k"}})),
            Err("response missing `url`")
        );
        assert_eq!(
            StorageDestination::from_init_body(&json!({"url": "https://x", "params": {}})),
            Err("params missing `key`")
        );
    }

    #[test]
    fn test_remote_id() {
        assert_eq!(remote_id(&json!({"id": "abc"})), Some(json!("abc")));
        assert_eq!(remote_id(&json!({"id": 42})), Some(json!(42)));
        assert_eq!(remote_id(&json!({"id": null})), None);
        assert_eq!(remote_id(&json!({"error": "nope"})), None);
    }

    #[test]
    fn test_receipt_keeps_id_type() {
        let file_digest = crate::digest::digest_reader(&b"book"[..]).unwrap();
        let metadata_digest =
            crate::digest::digest_metadata(&crate::metadata::MetadataRecord::new("Foo"), None).unwrap();

        let numeric = UploadReceipt::new(json!(987), "k".to_string(), &file_digest, &metadata_digest);
        assert_eq!(numeric.id, json!(987));
        assert_eq!(numeric.id_text(), "987");
        assert_eq!(json!({ "bookfusion_id": numeric.id }).to_string(), r#"{"bookfusion_id":987}"#);

        let text = UploadReceipt::new(json!("bf-1"), "k".to_string(), &file_digest, &metadata_digest);
        assert_eq!(text.id_text(), "bf-1");
    }
}
