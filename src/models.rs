// src/models.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Text-backed enums: stored as TEXT columns, exchanged as snake_case JSON strings.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} `{}`", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role {
    Student => "student",
    Teacher => "teacher",
    Freelancer => "freelancer",
    Admin => "admin",
});

text_enum!(
    /// Where on the site a banner is rendered.
    Placement {
        DashboardBanner => "dashboard_banner",
        Sidebar => "sidebar",
        CoursePage => "course_page",
        CommunityFeed => "community_feed",
        VideoOverlay => "video_overlay",
    }
);

text_enum!(AdStatus {
    PendingPayment => "pending_payment",
    PendingReview => "pending_review",
    Active => "active",
    Rejected => "rejected",
    Paused => "paused",
});

text_enum!(PayoutMethod {
    Bank => "bank",
    Paypal => "paypal",
});

text_enum!(PayoutStatus {
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
});

text_enum!(Provider {
    Stripe => "stripe",
    Paypal => "paypal",
    Wallet => "wallet",
});

text_enum!(PaymentPurpose {
    Course => "course",
    Membership => "membership",
    Ad => "ad",
    WalletTopUp => "wallet_top_up",
});

text_enum!(TxStatus {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
    RefundRequired => "refund_required",
    Refunded => "refunded",
});

text_enum!(PlanInterval {
    Monthly => "monthly",
    Yearly => "yearly",
});

text_enum!(MeetingStatus {
    Scheduled => "scheduled",
    Canceled => "canceled",
});

impl PlanInterval {
    pub fn period(self) -> chrono::Duration {
        match self {
            PlanInterval::Monthly => chrono::Duration::days(30),
            PlanInterval::Yearly => chrono::Duration::days(365),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub birth_date: Option<NaiveDate>,
    pub grade: Option<i32>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub wallet_balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdBanner {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub image_url: Option<String>,
    pub target_url: String,
    pub placement: String,
    pub target_countries: Json<Vec<String>>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub target_grades: Json<Vec<i32>>,
    pub duration_days: i32,
    pub price_cents: i64,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub impressions: i64,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PayoutAccount {
    pub id: i32,
    pub user_id: i32,
    pub method: String,
    pub account_holder: String,
    pub bank_name: Option<String>,
    pub account_number_last4: Option<String>,
    pub account_number_masked: Option<String>,
    pub routing_number: Option<String>,
    pub paypal_email: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    pub provider: String,
    pub provider_ref: String,
    pub purpose: String,
    pub target_id: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub payload: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MembershipPlan {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: String,
    pub features: Json<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Membership {
    pub id: i32,
    pub user_id: i32,
    pub plan_id: i32,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Course {
    pub id: i32,
    pub teacher_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub grade: Option<i32>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Lesson {
    pub id: i32,
    pub course_id: i32,
    pub position: i32,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meeting {
    pub id: i32,
    pub course_id: i32,
    pub host_id: i32,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub join_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudyNote {
    pub id: i32,
    pub user_id: i32,
    pub course_id: Option<i32>,
    pub title: String,
    pub content: String,
    pub tags: Json<Vec<String>>,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunityPost {
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    pub body: String,
    pub category: String,
    pub reply_count: i32,
    pub like_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunityReply {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportAgent {
    pub id: i32,
    pub user_id: i32,
    pub display_name: String,
    pub department: String,
    pub is_active: bool,
    pub max_open_tickets: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuickResponse {
    pub id: i32,
    pub agent_id: i32,
    pub shortcut: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
