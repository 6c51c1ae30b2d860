use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    Immediate,
    Scheduled,
    Recurring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
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

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::PendingApproval => "pending_approval",
            CampaignStatus::Approved => "approved",
            CampaignStatus::Rejected => "rejected",
            CampaignStatus::AssetGeneration => "asset_generation",
            CampaignStatus::AssetGenerated => "asset_generated",
            CampaignStatus::ReadyToLaunch => "ready_to_launch",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient delivery ladder. Forward-only, except that the retry
/// subsystem may reset a failed row back to `Pending` when requeueing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
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

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::AssetGenerating => "asset_generating",
            MessageStatus::AssetGenerated => "asset_generated",
            MessageStatus::ReadyToSend => "ready_to_send",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Processing,
    Generated,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdminApproval {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Header,
    Body,
    Footer,
    Buttons,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFormat {
    Text,
    Image,
    Video,
    Document,
}

impl ComponentFormat {
    pub fn media_kind(&self) -> Option<&'static str> {
        match self {
            ComponentFormat::Text => None,
            ComponentFormat::Image => Some("image"),
            ComponentFormat::Video => Some("video"),
            ComponentFormat::Document => Some("document"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateButton {
    #[serde(rename = "type")]
    pub button_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One ordered block of a provider template. Body and text-header blocks may
/// carry positional placeholders (`{{1}}`..`{{n}}`) in their text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateComponent {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ComponentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<TemplateButton>,
}

/// The slice of a template the payload generator needs, detached from the
/// storage row so the generator stays free of I/O.
#[derive(Debug, Clone)]
pub struct TemplateView {
    pub name: String,
    pub language: String,
    pub category: Option<String>,
    pub components: Vec<TemplateComponent>,
    pub parameters: HashMap<String, String>,
    pub status: TemplateStatus,
    pub admin_approval: AdminApproval,
}

impl TemplateView {
    /// Both approval gates must be open before a template can produce payloads.
    pub fn is_usable(&self) -> bool {
        self.status == TemplateStatus::Approved && self.admin_approval == AdminApproval::Approved
    }

    /// A media-format header means every recipient needs a generated asset
    /// before it can be dispatched.
    pub fn requires_generated_asset(&self) -> bool {
        self.components.iter().any(|c| {
            c.component_type == ComponentType::Header
                && c.format.map_or(false, |f| f.media_kind().is_some())
        })
    }

    pub fn header_media_kind(&self) -> Option<&'static str> {
        self.components.iter().find_map(|c| {
            if c.component_type == ComponentType::Header {
                c.format.and_then(|f| f.media_kind())
            } else {
                None
            }
        })
    }

    pub fn body_text(&self) -> Option<&str> {
        self.components.iter().find_map(|c| {
            if c.component_type == ComponentType::Body {
                c.text.as_deref()
            } else {
                None
            }
        })
    }
}

/// The slice of an audience row the payload generator needs.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub msisdn: String,
    pub attributes: HashMap<String, String>,
    pub generated_asset_urls: HashMap<String, String>,
}
