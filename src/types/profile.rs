use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quiz::RiskProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub base_currency: String,
    pub risk_profile: Option<RiskProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: Uuid, username: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: username.to_string(),
            display_name: None,
            base_currency: "USD".to_string(),
            risk_profile: None,
            created_at: now,
            updated_at: now,
        }
    }
}
