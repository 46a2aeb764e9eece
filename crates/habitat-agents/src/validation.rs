//! Parameter validation for action intents.
//!
//! These checks are pure functions of the parameters alone -- no agent or
//! world state. They run twice on purpose: once at the gateway boundary
//! (so bad external submissions get a 400 before touching the engine) and
//! again at the head of every handler, so the cache-hit and cache-miss
//! decision paths are validated identically.

use habitat_types::ActionParams;

/// Inclusive gather quantity bounds.
pub const GATHER_QUANTITY_RANGE: (u32, u32) = (1, 5);

/// Inclusive work duration bounds.
pub const WORK_DURATION_RANGE: (u32, u32) = (1, 5);

/// Inclusive sleep duration bounds.
pub const SLEEP_DURATION_RANGE: (u32, u32) = (1, 10);

/// Inclusive deceive claim length bounds, in characters.
pub const CLAIM_LENGTH_RANGE: (usize, usize) = (5, 500);

/// Inclusive sentiment bounds for `share_info`.
pub const SENTIMENT_RANGE: (i32, i32) = (-100, 100);

/// Maximum length of a location name.
pub const LOCATION_NAME_MAX: usize = 50;

/// Validate an intent's parameters. Returns the rejection reason on
/// failure; the caller wraps it into an `ActionResult` or HTTP 400.
pub fn validate_params(params: &ActionParams) -> Result<(), String> {
    match params {
        ActionParams::Move { .. } | ActionParams::Consume { .. } | ActionParams::Claim {} => Ok(()),
        ActionParams::Buy { quantity, .. } => {
            if *quantity == 0 {
                return Err(String::from("Invalid quantity"));
            }
            Ok(())
        }
        ActionParams::Sleep { duration } => {
            if *duration < SLEEP_DURATION_RANGE.0 || *duration > SLEEP_DURATION_RANGE.1 {
                return Err(String::from("Invalid duration"));
            }
            Ok(())
        }
        ActionParams::Work { duration } => {
            if *duration < WORK_DURATION_RANGE.0 || *duration > WORK_DURATION_RANGE.1 {
                return Err(String::from("Invalid duration"));
            }
            Ok(())
        }
        ActionParams::Gather { quantity, .. } => {
            if *quantity < GATHER_QUANTITY_RANGE.0 || *quantity > GATHER_QUANTITY_RANGE.1 {
                return Err(String::from("Invalid quantity"));
            }
            Ok(())
        }
        ActionParams::Trade {
            offer_quantity,
            request_quantity,
            ..
        } => {
            if *offer_quantity == 0 || *request_quantity == 0 {
                return Err(String::from("Invalid quantity"));
            }
            Ok(())
        }
        ActionParams::Harm { .. } | ActionParams::Steal { .. } => Ok(()),
        ActionParams::Deceive { claim, .. } => {
            let len = claim.chars().count();
            if len < CLAIM_LENGTH_RANGE.0 || len > CLAIM_LENGTH_RANGE.1 {
                return Err(String::from("Claim must be 5-500 characters"));
            }
            Ok(())
        }
        ActionParams::ShareInfo {
            target_agent_id,
            subject_agent_id,
            sentiment,
            ..
        } => {
            if target_agent_id == subject_agent_id {
                return Err(String::from("Sharer, subject, and target must be distinct"));
            }
            if let Some(s) = sentiment
                && (*s < SENTIMENT_RANGE.0 || *s > SENTIMENT_RANGE.1)
            {
                return Err(String::from("Invalid sentiment"));
            }
            Ok(())
        }
        ActionParams::NameLocation { name } => {
            let len = name.trim().chars().count();
            if len == 0 || len > LOCATION_NAME_MAX {
                return Err(String::from("Invalid name"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habitat_types::{AgentId, ClaimType, HarmIntensity, InfoType, ItemType};

    use super::*;

    #[test]
    fn gather_quantity_bounds() {
        let make = |quantity| ActionParams::Gather {
            resource_type: None,
            quantity,
        };
        assert!(validate_params(&make(0)).is_err());
        assert!(validate_params(&make(1)).is_ok());
        assert!(validate_params(&make(5)).is_ok());
        assert!(validate_params(&make(6)).is_err());
    }

    #[test]
    fn work_duration_bounds() {
        let make = |duration| ActionParams::Work { duration };
        assert!(validate_params(&make(0)).is_err());
        assert!(validate_params(&make(5)).is_ok());
        assert!(validate_params(&make(6)).is_err());
    }

    #[test]
    fn sleep_duration_bounds() {
        let make = |duration| ActionParams::Sleep { duration };
        assert!(validate_params(&make(0)).is_err());
        assert!(validate_params(&make(10)).is_ok());
        assert!(validate_params(&make(11)).is_err());
    }

    #[test]
    fn deceive_claim_length_bounds() {
        let make = |len: usize| ActionParams::Deceive {
            target_agent_id: AgentId::new(),
            claim: "x".repeat(len),
            claim_type: ClaimType::Other,
        };
        assert!(validate_params(&make(4)).is_err());
        assert!(validate_params(&make(5)).is_ok());
        assert!(validate_params(&make(500)).is_ok());
        assert!(validate_params(&make(501)).is_err());
    }

    #[test]
    fn share_info_rejects_same_target_and_subject() {
        let id = AgentId::new();
        let params = ActionParams::ShareInfo {
            target_agent_id: id,
            subject_agent_id: id,
            info_type: InfoType::Location,
            sentiment: None,
        };
        assert!(validate_params(&params).is_err());
    }

    #[test]
    fn share_info_sentiment_bounds() {
        let make = |sentiment| ActionParams::ShareInfo {
            target_agent_id: AgentId::new(),
            subject_agent_id: AgentId::new(),
            info_type: InfoType::Reputation,
            sentiment: Some(sentiment),
        };
        assert!(validate_params(&make(-100)).is_ok());
        assert!(validate_params(&make(100)).is_ok());
        assert!(validate_params(&make(-101)).is_err());
        assert!(validate_params(&make(101)).is_err());
    }

    #[test]
    fn harm_params_have_no_static_bounds() {
        let params = ActionParams::Harm {
            target_agent_id: AgentId::new(),
            intensity: HarmIntensity::Severe,
        };
        assert!(validate_params(&params).is_ok());
    }

    #[test]
    fn buy_zero_quantity_rejected() {
        let params = ActionParams::Buy {
            item_type: ItemType::Food,
            quantity: 0,
        };
        assert!(validate_params(&params).is_err());
    }

    #[test]
    fn name_location_bounds() {
        assert!(validate_params(&ActionParams::NameLocation {
            name: String::from("  ")
        })
        .is_err());
        assert!(validate_params(&ActionParams::NameLocation {
            name: String::from("Lakeside")
        })
        .is_ok());
        assert!(validate_params(&ActionParams::NameLocation {
            name: "n".repeat(51)
        })
        .is_err());
    }
}
