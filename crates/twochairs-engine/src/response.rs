//! Outcome of one incoming message, in the camelCase wire shape.

use serde::{Deserialize, Serialize};

use crate::config::SafetyCopy;
use crate::cycle::Round;

pub const CRISIS_ALERT_MESSAGE: &str =
    "We identified harmful words in your conversation. Life is worth living, you are not alone.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoundResponse {
    Locked(LockedResponse),
    Awaiting(AwaitingResponse),
    Completed(CompletedResponse),
}

impl RoundResponse {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }

    pub fn as_completed(&self) -> Option<&CompletedResponse> {
        match self {
            Self::Completed(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_awaiting(&self) -> Option<&AwaitingResponse> {
        match self {
            Self::Awaiting(a) => Some(a),
            _ => None,
        }
    }
}

/// The fixed crisis response, identical whichever layer triggered it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedResponse {
    pub crisis: bool,
    pub locked: bool,
    pub alert_message: String,
    pub hotlines_url: String,
    pub resources_url: String,
    /// Present only on the response that latched the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_trusted_contact: Option<bool>,
}

impl LockedResponse {
    pub fn new(copy: &SafetyCopy, notified_trusted_contact: Option<bool>) -> Self {
        Self {
            crisis: true,
            locked: true,
            alert_message: CRISIS_ALERT_MESSAGE.to_string(),
            hotlines_url: copy.hotlines_url.clone(),
            resources_url: copy.resources_url.clone(),
            notified_trusted_contact,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCounts {
    #[serde(rename = "self")]
    pub self_: usize,
    pub monster: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitingResponse {
    pub await_more: bool,
    pub have: RoundCounts,
    pub need: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl AwaitingResponse {
    pub fn for_round(round: &Round, suggestions: Option<Vec<String>>) -> Self {
        Self {
            await_more: true,
            have: RoundCounts {
                self_: round.self_count(),
                monster: round.monster_count(),
            },
            need: round.remaining(),
            suggestions,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyPopup {
    pub show_safety_popup: bool,
    pub message: String,
    pub accept_redirect: String,
    pub decline_stay: bool,
}

impl SafetyPopup {
    pub fn new(copy: &SafetyCopy) -> Self {
        Self {
            show_safety_popup: true,
            message: copy.popup_message.clone(),
            accept_redirect: copy.redirect_path.clone(),
            decline_stay: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub ask_to_continue: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedResponse {
    pub await_more: bool,
    pub reply: String,
    /// Serialised as `null` when no escalation is offered.
    pub safety: Option<SafetyPopup>,
    pub next: NextStep,
}

impl CompletedResponse {
    pub fn new(reply: String, safety: Option<SafetyPopup>) -> Self {
        Self {
            await_more: false,
            reply,
            safety,
            next: NextStep {
                ask_to_continue: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_wire_shape() {
        let json = serde_json::to_value(RoundResponse::Locked(LockedResponse::new(
            &SafetyCopy::default(),
            Some(false),
        )))
        .unwrap();
        assert_eq!(json["crisis"], true);
        assert_eq!(json["locked"], true);
        assert_eq!(json["hotlinesUrl"], "https://www.sos.org.sg/contact");
        assert_eq!(json["notifiedTrustedContact"], false);
    }

    #[test]
    fn latched_response_omits_notification() {
        let json = serde_json::to_value(LockedResponse::new(&SafetyCopy::default(), None)).unwrap();
        assert!(json.get("notifiedTrustedContact").is_none());
    }

    #[test]
    fn awaiting_wire_shape() {
        let resp = AwaitingResponse {
            await_more: true,
            have: RoundCounts { self_: 1, monster: 1 },
            need: 4,
            suggestions: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["awaitMore"], true);
        assert_eq!(json["have"]["self"], 1);
        assert_eq!(json["need"], 4);
        assert!(json.get("suggestions").is_none());
    }

    #[test]
    fn completed_serialises_null_safety() {
        let json = serde_json::to_value(CompletedResponse::new("hello".into(), None)).unwrap();
        assert_eq!(json["awaitMore"], false);
        assert!(json["safety"].is_null());
        assert_eq!(json["next"]["askToContinue"], true);
    }

    #[test]
    fn popup_wire_shape() {
        let popup = SafetyPopup::new(&SafetyCopy::default());
        let json = serde_json::to_value(CompletedResponse::new("r".into(), Some(popup))).unwrap();
        assert_eq!(json["safety"]["showSafetyPopup"], true);
        assert_eq!(json["safety"]["acceptRedirect"], "/therapist-room");
        assert_eq!(json["safety"]["declineStay"], true);
    }

    #[test]
    fn untagged_round_trip_picks_variant() {
        let completed = RoundResponse::Completed(CompletedResponse::new("r".into(), None));
        let back: RoundResponse =
            serde_json::from_value(serde_json::to_value(&completed).unwrap()).unwrap();
        assert_eq!(back, completed);

        let locked = RoundResponse::Locked(LockedResponse::new(&SafetyCopy::default(), None));
        let back: RoundResponse =
            serde_json::from_value(serde_json::to_value(&locked).unwrap()).unwrap();
        assert!(back.is_locked());
    }
}
