use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::broadcast::{BroadcastResponse, FinalResponse};
use crate::recovery::ResolutionOutcome;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status and JSON body an HTTP handler returns for a resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    pub fn from_outcome(outcome: &ResolutionOutcome) -> Self {
        let candidate = &outcome.chosen_candidate;
        let mut body = Map::new();

        body.insert("success".into(), outcome.success.into());
        if let Some(txid) = outcome.txid() {
            body.insert("txid".into(), txid.into());
        }

        match &outcome.final_response {
            FinalResponse::Broadcast(BroadcastResponse::Rejected(rejection)) => {
                body.insert("error".into(), rejection.error.clone().into());
                if let Some(reason) = &rejection.reason {
                    body.insert("reason".into(), reason.clone().into());
                }
                if let Some(reason_data) = &rejection.reason_data {
                    body.insert("reason_data".into(), reason_data.clone());
                }
            }
            FinalResponse::Exception { error, message } => {
                body.insert("error".into(), error.clone().into());
                body.insert("message".into(), message.clone().into());
            }
            FinalResponse::Broadcast(BroadcastResponse::Accepted { .. }) => {}
        }

        body.insert(
            "response".into(),
            serde_json::to_value(&outcome.final_response).unwrap_or(Value::Null),
        );
        body.insert(
            "signatureData".into(),
            json!({
                "marker": candidate.marker().to_hex(),
                "r": candidate.r_hex(),
                "s": candidate.s_hex(),
                "fullSignature": candidate.full_signature_hex(),
            }),
        );
        body.insert("allVariantsTested".into(), outcome.attempts_count.into());

        let status = if outcome.success {
            STATUS_OK
        } else {
            STATUS_BAD_REQUEST
        };

        Self {
            status,
            body: Value::Object(body),
        }
    }
}
