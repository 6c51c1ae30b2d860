//! Provider-ready payload generation.
//!
//! Turns one (template, recipient) pair into the message shape the external
//! templated-messaging provider accepts. Pure except for the error channel:
//! per-recipient failures are returned, never panicked, so the batcher can
//! isolate them.

use crate::resolver::resolve_for_recipient;
use crate::types::{ComponentType, Recipient, TemplateView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("template is not approved for campaign use")]
    TemplateNotUsable,
    #[error("no generated {kind} asset for recipient {recipient}")]
    MissingAsset { kind: String, recipient: String },
    #[error("invalid payload: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadComponent {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// The three message shapes the provider accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum MessagePayload {
    #[serde(rename_all = "camelCase")]
    Template {
        recipient: String,
        template_name: String,
        template_language: String,
        components: Vec<PayloadComponent>,
    },
    #[serde(rename_all = "camelCase")]
    Media {
        recipient: String,
        media_type: String,
        media_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Text { recipient: String, content: String },
}

impl MessagePayload {
    pub fn recipient(&self) -> &str {
        match self {
            MessagePayload::Template { recipient, .. } => recipient,
            MessagePayload::Media { recipient, .. } => recipient,
            MessagePayload::Text { recipient, .. } => recipient,
        }
    }

    /// Human-readable body for the delivery record, where one exists.
    pub fn content_summary(&self) -> Option<&str> {
        match self {
            MessagePayload::Template { components, .. } => components
                .iter()
                .find(|c| c.component_type == "body")
                .and_then(|c| c.value.as_deref()),
            MessagePayload::Media { caption, .. } => caption.as_deref(),
            MessagePayload::Text { content, .. } => Some(content),
        }
    }
}

/// Build the provider payload for one recipient.
///
/// Dispatches on template shape: a provider-categorized template produces a
/// component-wise template payload; a bare media header produces a free-form
/// media message with a resolved caption; anything else is plain text.
pub fn generate_payload(
    template: &TemplateView,
    recipient: &Recipient,
) -> Result<MessagePayload, PayloadError> {
    if !template.is_usable() {
        return Err(PayloadError::TemplateNotUsable);
    }

    let payload = if template.category.is_some() && !template.components.is_empty() {
        structured_payload(template, recipient)?
    } else if let Some(kind) = template.header_media_kind() {
        let media_url = asset_url(recipient, kind)?;
        let caption = template
            .body_text()
            .map(|text| resolve_for_recipient(text, recipient, &template.parameters));
        MessagePayload::Media {
            recipient: recipient.msisdn.clone(),
            media_type: kind.to_string(),
            media_url,
            caption,
        }
    } else {
        let body = template.body_text().unwrap_or_default();
        MessagePayload::Text {
            recipient: recipient.msisdn.clone(),
            content: resolve_for_recipient(body, recipient, &template.parameters),
        }
    };

    validate_payload(&payload)?;
    Ok(payload)
}

fn structured_payload(
    template: &TemplateView,
    recipient: &Recipient,
) -> Result<MessagePayload, PayloadError> {
    let mut components = Vec::with_capacity(template.components.len());

    for component in &template.components {
        match component.component_type {
            ComponentType::Header => {
                if let Some(kind) = component.format.and_then(|f| f.media_kind()) {
                    components.push(PayloadComponent {
                        component_type: "header".to_string(),
                        value: None,
                        media_url: Some(asset_url(recipient, kind)?),
                    });
                } else if let Some(text) = component.text.as_deref() {
                    components.push(PayloadComponent {
                        component_type: "header".to_string(),
                        value: Some(resolve_for_recipient(
                            text,
                            recipient,
                            &template.parameters,
                        )),
                        media_url: None,
                    });
                }
            }
            ComponentType::Body => {
                if let Some(text) = component.text.as_deref() {
                    components.push(PayloadComponent {
                        component_type: "body".to_string(),
                        value: Some(resolve_for_recipient(
                            text,
                            recipient,
                            &template.parameters,
                        )),
                        media_url: None,
                    });
                }
            }
            ComponentType::Footer => {
                if let Some(text) = component.text.as_deref() {
                    components.push(PayloadComponent {
                        component_type: "footer".to_string(),
                        value: Some(text.to_string()),
                        media_url: None,
                    });
                }
            }
            ComponentType::Buttons => {
                for button in &component.buttons {
                    if let Some(url) = button.url.as_deref() {
                        components.push(PayloadComponent {
                            component_type: "button".to_string(),
                            value: Some(resolve_for_recipient(
                                url,
                                recipient,
                                &template.parameters,
                            )),
                            media_url: None,
                        });
                    }
                }
            }
        }
    }

    Ok(MessagePayload::Template {
        recipient: recipient.msisdn.clone(),
        template_name: template.name.clone(),
        template_language: template.language.clone(),
        components,
    })
}

fn asset_url(recipient: &Recipient, kind: &str) -> Result<String, PayloadError> {
    recipient
        .generated_asset_urls
        .get(kind)
        .cloned()
        .ok_or_else(|| PayloadError::MissingAsset {
            kind: kind.to_string(),
            recipient: recipient.id.clone(),
        })
}

/// Reject payloads the provider would bounce. Invalid payloads are dropped
/// with a per-recipient error so the rest of the batch proceeds.
pub fn validate_payload(payload: &MessagePayload) -> Result<(), PayloadError> {
    if payload.recipient().trim().is_empty() {
        return Err(PayloadError::Invalid("recipient is empty".to_string()));
    }
    match payload {
        MessagePayload::Template {
            template_name,
            template_language,
            ..
        } => {
            if template_name.trim().is_empty() {
                return Err(PayloadError::Invalid("template name is empty".to_string()));
            }
            if template_language.trim().is_empty() {
                return Err(PayloadError::Invalid(
                    "template language is empty".to_string(),
                ));
            }
        }
        MessagePayload::Media { media_url, .. } => {
            if media_url.trim().is_empty() {
                return Err(PayloadError::Invalid("media url is empty".to_string()));
            }
        }
        MessagePayload::Text { content, .. } => {
            if content.trim().is_empty() {
                return Err(PayloadError::Invalid("text content is empty".to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AdminApproval, ComponentFormat, TemplateButton, TemplateComponent, TemplateStatus,
    };

    fn recipient() -> Recipient {
        Recipient {
            id: "aud_1".into(),
            name: "John".into(),
            msisdn: "+14155552671".into(),
            attributes: [
                ("customer_name".to_string(), "John".to_string()),
                ("order_number".to_string(), "ORD-1".to_string()),
            ]
            .into_iter()
            .collect(),
            generated_asset_urls: [(
                "image".to_string(),
                "https://cdn.example.com/aud_1.png".to_string(),
            )]
            .into_iter()
            .collect(),
        }
    }

    fn approved_template(components: Vec<TemplateComponent>) -> TemplateView {
        TemplateView {
            name: "order_ready".into(),
            language: "en".into(),
            category: Some("MARKETING".into()),
            components,
            parameters: [
                ("1".to_string(), "customer_name".to_string()),
                ("2".to_string(), "order_number".to_string()),
            ]
            .into_iter()
            .collect(),
            status: TemplateStatus::Approved,
            admin_approval: AdminApproval::Approved,
        }
    }

    fn body(text: &str) -> TemplateComponent {
        TemplateComponent {
            component_type: ComponentType::Body,
            format: None,
            text: Some(text.to_string()),
            buttons: vec![],
        }
    }

    #[test]
    fn test_structured_template_payload() {
        let template = approved_template(vec![
            TemplateComponent {
                component_type: ComponentType::Header,
                format: Some(ComponentFormat::Image),
                text: None,
                buttons: vec![],
            },
            body("Hello {{1}}, order {{2}} is ready"),
            TemplateComponent {
                component_type: ComponentType::Buttons,
                format: None,
                text: None,
                buttons: vec![TemplateButton {
                    button_type: "url".into(),
                    text: "Track".into(),
                    url: Some("https://shop.example.com/orders/{{2}}".into()),
                }],
            },
        ]);

        let payload = generate_payload(&template, &recipient()).unwrap();
        match payload {
            MessagePayload::Template {
                recipient,
                template_name,
                template_language,
                components,
            } => {
                assert_eq!(recipient, "+14155552671");
                assert_eq!(template_name, "order_ready");
                assert_eq!(template_language, "en");
                assert_eq!(components.len(), 3);
                assert_eq!(
                    components[0].media_url.as_deref(),
                    Some("https://cdn.example.com/aud_1.png")
                );
                assert_eq!(
                    components[1].value.as_deref(),
                    Some("Hello John, order ORD-1 is ready")
                );
                assert_eq!(
                    components[2].value.as_deref(),
                    Some("https://shop.example.com/orders/ORD-1")
                );
            }
            other => panic!("expected template payload, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_asset_is_per_recipient_error() {
        let template = approved_template(vec![
            TemplateComponent {
                component_type: ComponentType::Header,
                format: Some(ComponentFormat::Video),
                text: None,
                buttons: vec![],
            },
            body("Hi {{1}}"),
        ]);

        let err = generate_payload(&template, &recipient()).unwrap_err();
        assert_eq!(
            err,
            PayloadError::MissingAsset {
                kind: "video".into(),
                recipient: "aud_1".into(),
            }
        );
    }

    #[test]
    fn test_free_form_media_header() {
        let mut template = approved_template(vec![
            TemplateComponent {
                component_type: ComponentType::Header,
                format: Some(ComponentFormat::Image),
                text: None,
                buttons: vec![],
            },
            body("Hi {{1}}"),
        ]);
        template.category = None;

        let payload = generate_payload(&template, &recipient()).unwrap();
        match payload {
            MessagePayload::Media {
                media_type,
                media_url,
                caption,
                ..
            } => {
                assert_eq!(media_type, "image");
                assert_eq!(media_url, "https://cdn.example.com/aud_1.png");
                assert_eq!(caption.as_deref(), Some("Hi John"));
            }
            other => panic!("expected media payload, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_fallback() {
        let mut template = approved_template(vec![body("Hello {{name}}")]);
        template.category = None;

        let payload = generate_payload(&template, &recipient()).unwrap();
        match payload {
            MessagePayload::Text { content, .. } => assert_eq!(content, "Hello John"),
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[test]
    fn test_unapproved_template_rejected() {
        let mut template = approved_template(vec![body("Hi")]);
        template.admin_approval = AdminApproval::Pending;
        assert_eq!(
            generate_payload(&template, &recipient()).unwrap_err(),
            PayloadError::TemplateNotUsable
        );
    }

    #[test]
    fn test_empty_text_payload_invalid() {
        let mut template = approved_template(vec![]);
        template.category = None;
        assert!(matches!(
            generate_payload(&template, &recipient()).unwrap_err(),
            PayloadError::Invalid(_)
        ));
    }

    #[test]
    fn test_validate_rejects_blank_recipient() {
        let payload = MessagePayload::Text {
            recipient: "  ".into(),
            content: "hi".into(),
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_template_fields() {
        let payload = MessagePayload::Template {
            recipient: "+14155552671".into(),
            template_name: "".into(),
            template_language: "en".into(),
            components: vec![],
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let payload = MessagePayload::Media {
            recipient: "+14155552671".into(),
            media_type: "image".into(),
            media_url: "https://cdn.example.com/x.png".into(),
            caption: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messageType"], "media");
        assert_eq!(json["mediaUrl"], "https://cdn.example.com/x.png");
    }
}
