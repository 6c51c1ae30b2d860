use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

use smscore::types as domain;
use smscore::types::TemplateComponent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "campaign_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    Immediate,
    Scheduled,
    Recurring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "campaign_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    AssetGeneration,
    AssetGenerated,
    ReadyToLaunch,
    Running,
    Paused,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    AssetGenerating,
    AssetGenerated,
    ReadyToSend,
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "asset_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Processing,
    Generated,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "template_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "admin_approval", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdminApproval {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Outbound,
    Inbound,
}

impl From<CampaignType> for domain::CampaignType {
    fn from(value: CampaignType) -> Self {
        match value {
            CampaignType::Immediate => domain::CampaignType::Immediate,
            CampaignType::Scheduled => domain::CampaignType::Scheduled,
            CampaignType::Recurring => domain::CampaignType::Recurring,
        }
    }
}

impl From<CampaignStatus> for domain::CampaignStatus {
    fn from(value: CampaignStatus) -> Self {
        match value {
            CampaignStatus::Draft => domain::CampaignStatus::Draft,
            CampaignStatus::PendingApproval => domain::CampaignStatus::PendingApproval,
            CampaignStatus::Approved => domain::CampaignStatus::Approved,
            CampaignStatus::Rejected => domain::CampaignStatus::Rejected,
            CampaignStatus::AssetGeneration => domain::CampaignStatus::AssetGeneration,
            CampaignStatus::AssetGenerated => domain::CampaignStatus::AssetGenerated,
            CampaignStatus::ReadyToLaunch => domain::CampaignStatus::ReadyToLaunch,
            CampaignStatus::Running => domain::CampaignStatus::Running,
            CampaignStatus::Paused => domain::CampaignStatus::Paused,
            CampaignStatus::Completed => domain::CampaignStatus::Completed,
            CampaignStatus::Cancelled => domain::CampaignStatus::Cancelled,
        }
    }
}

impl From<domain::CampaignStatus> for CampaignStatus {
    fn from(value: domain::CampaignStatus) -> Self {
        match value {
            domain::CampaignStatus::Draft => CampaignStatus::Draft,
            domain::CampaignStatus::PendingApproval => CampaignStatus::PendingApproval,
            domain::CampaignStatus::Approved => CampaignStatus::Approved,
            domain::CampaignStatus::Rejected => CampaignStatus::Rejected,
            domain::CampaignStatus::AssetGeneration => CampaignStatus::AssetGeneration,
            domain::CampaignStatus::AssetGenerated => CampaignStatus::AssetGenerated,
            domain::CampaignStatus::ReadyToLaunch => CampaignStatus::ReadyToLaunch,
            domain::CampaignStatus::Running => CampaignStatus::Running,
            domain::CampaignStatus::Paused => CampaignStatus::Paused,
            domain::CampaignStatus::Completed => CampaignStatus::Completed,
            domain::CampaignStatus::Cancelled => CampaignStatus::Cancelled,
        }
    }
}

impl From<MessageStatus> for domain::MessageStatus {
    fn from(value: MessageStatus) -> Self {
        match value {
            MessageStatus::Pending => domain::MessageStatus::Pending,
            MessageStatus::AssetGenerating => domain::MessageStatus::AssetGenerating,
            MessageStatus::AssetGenerated => domain::MessageStatus::AssetGenerated,
            MessageStatus::ReadyToSend => domain::MessageStatus::ReadyToSend,
            MessageStatus::Sent => domain::MessageStatus::Sent,
            MessageStatus::Delivered => domain::MessageStatus::Delivered,
            MessageStatus::Read => domain::MessageStatus::Read,
            MessageStatus::Failed => domain::MessageStatus::Failed,
        }
    }
}

impl From<domain::MessageStatus> for MessageStatus {
    fn from(value: domain::MessageStatus) -> Self {
        match value {
            domain::MessageStatus::Pending => MessageStatus::Pending,
            domain::MessageStatus::AssetGenerating => MessageStatus::AssetGenerating,
            domain::MessageStatus::AssetGenerated => MessageStatus::AssetGenerated,
            domain::MessageStatus::ReadyToSend => MessageStatus::ReadyToSend,
            domain::MessageStatus::Sent => MessageStatus::Sent,
            domain::MessageStatus::Delivered => MessageStatus::Delivered,
            domain::MessageStatus::Read => MessageStatus::Read,
            domain::MessageStatus::Failed => MessageStatus::Failed,
        }
    }
}

impl From<AssetStatus> for domain::AssetStatus {
    fn from(value: AssetStatus) -> Self {
        match value {
            AssetStatus::Pending => domain::AssetStatus::Pending,
            AssetStatus::Processing => domain::AssetStatus::Processing,
            AssetStatus::Generated => domain::AssetStatus::Generated,
            AssetStatus::Failed => domain::AssetStatus::Failed,
        }
    }
}

impl From<TemplateStatus> for domain::TemplateStatus {
    fn from(value: TemplateStatus) -> Self {
        match value {
            TemplateStatus::Draft => domain::TemplateStatus::Draft,
            TemplateStatus::PendingApproval => domain::TemplateStatus::PendingApproval,
            TemplateStatus::Approved => domain::TemplateStatus::Approved,
            TemplateStatus::Rejected => domain::TemplateStatus::Rejected,
        }
    }
}

impl From<AdminApproval> for domain::AdminApproval {
    fn from(value: AdminApproval) -> Self {
        match value {
            AdminApproval::Pending => domain::AdminApproval::Pending,
            AdminApproval::Approved => domain::AdminApproval::Approved,
            AdminApproval::Rejected => domain::AdminApproval::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: String,
    pub organization_id: String,
    pub template_id: String,
    pub name: String,
    pub campaign_type: CampaignType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub asset_generation_status: AssetStatus,
    pub asset_retry_count: i32,
    pub asset_last_error: Option<String>,
    pub total_targeted_audience: i32,
    pub total_sent: i32,
    pub total_delivered: i32,
    pub total_read: i32,
    pub total_replied: i32,
    pub total_failed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AudienceMember {
    pub id: String,
    pub campaign_id: String,
    pub organization_id: String,
    pub name: String,
    pub msisdn: String,
    pub attributes: Json<HashMap<String, String>>,
    pub message_status: MessageStatus,
    pub failure_reason: Option<String>,
    pub asset_generation_status: AssetStatus,
    pub asset_retry_count: i32,
    pub asset_last_error: Option<String>,
    pub generated_asset_urls: Json<HashMap<String, String>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub asset_generation_started_at: Option<DateTime<Utc>>,
    pub asset_generation_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudienceMember {
    /// Detach the fields the payload generator needs.
    pub fn recipient(&self) -> domain::Recipient {
        domain::Recipient {
            id: self.id.clone(),
            name: self.name.clone(),
            msisdn: self.msisdn.clone(),
            attributes: self.attributes.0.clone(),
            generated_asset_urls: self.generated_asset_urls.0.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MasterAudienceRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub msisdn: String,
    pub attributes: Json<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub language: String,
    pub category: Option<String>,
    pub components: Json<Vec<TemplateComponent>>,
    pub status: TemplateStatus,
    pub admin_approval: AdminApproval,
    pub parameters: Json<HashMap<String, String>>,
    pub button_mappings: Json<HashMap<String, String>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Detach the fields the payload generator needs.
    pub fn view(&self) -> domain::TemplateView {
        domain::TemplateView {
            name: self.name.clone(),
            language: self.language.clone(),
            category: self.category.clone(),
            components: self.components.0.clone(),
            parameters: self.parameters.0.clone(),
            status: self.status.into(),
            admin_approval: self.admin_approval.into(),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == TemplateStatus::Approved && self.admin_approval == AdminApproval::Approved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub organization_id: String,
    pub campaign_id: String,
    pub audience_member_id: String,
    pub direction: MessageDirection,
    pub template_id: Option<String>,
    pub content: Option<String>,
    pub message_status: MessageStatus,
    pub retry_count: i32,
    pub failure_reason: Option<String>,
    pub provider_message_id: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
