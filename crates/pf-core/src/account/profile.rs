use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing plan of the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Pro,
    Team,
}

/// Flat account record of the signed-in user.
///
/// 当前登录用户的账户数据（扁平记录）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub plan: SubscriptionPlan,
    pub credits_remaining: u32,
    pub translated_pages: u32,
    #[serde(default)]
    pub plan_renews_at: Option<DateTime<Utc>>,
}
