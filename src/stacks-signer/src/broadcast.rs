use serde::{Deserialize, Serialize};

/// Rejection reason meaning the recovery marker was wrong.
pub const SIGNATURE_VALIDATION_REASON: &str = "SignatureValidation";

/// Error name of the synthetic response used when an attempt threw.
pub const EXCEPTION_ERROR: &str = "Exception";

/// Result of submitting a transaction to a Stacks node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BroadcastResponse {
    Rejected(BroadcastRejection),
    Accepted { txid: String },
}

impl BroadcastResponse {
    pub fn accepted(txid: impl Into<String>) -> Self {
        Self::Accepted { txid: txid.into() }
    }

    pub fn txid(&self) -> Option<&str> {
        match self {
            Self::Accepted { txid } => Some(txid),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&BroadcastRejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Accepted { .. } => None,
        }
    }
}

/// Rejection body returned by `POST /v2/transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRejection {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
}

impl BroadcastRejection {
    pub fn new(error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: Some(reason.into()),
            reason_data: None,
            txid: None,
        }
    }

    pub fn is_signature_validation(&self) -> bool {
        self.reason.as_deref() == Some(SIGNATURE_VALIDATION_REASON)
    }

    /// Most specific human readable message in the rejection.
    pub fn message(&self) -> &str {
        self.reason_data
            .as_ref()
            .and_then(|data| data.get("message"))
            .and_then(|message| message.as_str())
            .or(self.reason.as_deref())
            .unwrap_or(&self.error)
    }
}

/// What a resolution reports back: the deciding broadcast response, or an
/// exception when the last attempt threw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FinalResponse {
    Broadcast(BroadcastResponse),
    Exception { error: String, message: String },
}

impl FinalResponse {
    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception {
            error: EXCEPTION_ERROR.to_string(),
            message: message.into(),
        }
    }

    pub fn txid(&self) -> Option<&str> {
        match self {
            Self::Broadcast(response) => response.txid(),
            Self::Exception { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_decode_rejection() {
        let body = json!({
            "error": "transaction rejected",
            "reason": "SignatureValidation",
            "reason_data": { "message": "Signature is not valid" },
            "txid": "0xabcd"
        });

        let response: BroadcastResponse = serde_json::from_value(body).unwrap();
        let rejection = response.rejection().unwrap();

        assert!(rejection.is_signature_validation());
        assert_eq!(rejection.message(), "Signature is not valid");
        assert_eq!(rejection.txid.as_deref(), Some("0xabcd"));
        assert_eq!(response.txid(), None);
    }

    #[test]
    fn should_decode_acceptance() {
        let response: BroadcastResponse =
            serde_json::from_value(json!({ "txid": "0xabcd" })).unwrap();
        assert_eq!(response, BroadcastResponse::accepted("0xabcd"));
    }

    #[test]
    fn message_falls_back_to_reason_then_error() {
        let rejection = BroadcastRejection::new("transaction rejected", "NotEnoughFunds");
        assert_eq!(rejection.message(), "NotEnoughFunds");
        assert!(!rejection.is_signature_validation());

        let bare = BroadcastRejection {
            reason: None,
            ..rejection
        };
        assert_eq!(bare.message(), "transaction rejected");
    }

    #[test]
    fn should_serialize_exception() {
        let value = serde_json::to_value(FinalResponse::exception("boom")).unwrap();
        assert_eq!(value, json!({ "error": "Exception", "message": "boom" }));
    }
}
