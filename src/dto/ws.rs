use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dao::models::CourtId, dto::score::ScoreUpdatePayload};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from viewer WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerInboundMessage {
    /// Subscribe to a court channel.
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "courtId")]
        court_id: CourtId,
        /// Channel scope; defaults to the instance scope.
        scope: Option<String>,
    },
    /// Unsubscribe from a court channel.
    #[serde(rename = "leave")]
    Leave {
        #[serde(rename = "courtId")]
        court_id: CourtId,
    },
}

impl ViewerInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to viewer WebSocket clients.
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ViewerOutboundMessage {
    /// Latest snapshot of a joined court.
    ScoreUpdate {
        data: ScoreUpdatePayload,
    },
    /// Subscription acknowledged.
    Joined {
        #[serde(rename = "courtId")]
        court_id: CourtId,
    },
    /// Unsubscription acknowledged.
    Left {
        #[serde(rename = "courtId")]
        court_id: CourtId,
    },
    /// Request rejected.
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_scope_is_optional() {
        let message = ViewerInboundMessage::from_json_str(r#"{"type":"join","courtId":7}"#).unwrap();
        assert!(matches!(
            message,
            ViewerInboundMessage::Join {
                court_id: 7,
                scope: None
            }
        ));
    }

    #[test]
    fn outbound_events_are_kebab_tagged() {
        let json = serde_json::to_value(ViewerOutboundMessage::Joined { court_id: 3 }).unwrap();
        assert_eq!(json["event"], "joined");
        assert_eq!(json["courtId"], 3);
    }
}
