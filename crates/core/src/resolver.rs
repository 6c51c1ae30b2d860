//! Template placeholder resolution.
//!
//! Template text carries positional placeholders (`{{1}}`..`{{n}}`) bound to
//! recipient attributes through the admin-curated parameter mapping, plus
//! named placeholders (`{{attribute_name}}`) looked up directly. Unresolved
//! placeholders are left verbatim rather than treated as errors, so a partial
//! attribute set degrades the message instead of failing the recipient.

use crate::types::Recipient;
use std::collections::HashMap;

/// Replace every `{{token}}` occurrence for which `lookup` yields a value.
/// Tokens with no value are emitted back verbatim.
fn substitute<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = &after[..end];
                match lookup(token.trim()) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("{{");
                        out.push_str(token);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated opener, keep it and stop scanning.
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve positional placeholders through the parameter mapping, falling
/// back to the legacy `param_<n>` attribute convention, then resolve named
/// placeholders directly from the attribute map.
pub fn resolve_placeholders(
    text: &str,
    attributes: &HashMap<String, String>,
    parameters: &HashMap<String, String>,
) -> String {
    let positional = substitute(text, |token| {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if let Some(key) = parameters.get(token) {
            if let Some(value) = attributes.get(key) {
                return Some(value.clone());
            }
        }
        attributes.get(&format!("param_{token}")).cloned()
    });

    substitute(&positional, |token| attributes.get(token).cloned())
}

/// Full resolution for one recipient: placeholder passes plus the fixed
/// `{{name}}` / `{{phone}}` tokens taken from the recipient row itself.
/// An explicit attribute with the same key wins over the fixed token.
pub fn resolve_for_recipient(
    text: &str,
    recipient: &Recipient,
    parameters: &HashMap<String, String>,
) -> String {
    let resolved = resolve_placeholders(text, &recipient.attributes, parameters);
    substitute(&resolved, |token| match token {
        "name" => Some(recipient.name.clone()),
        "phone" => Some(recipient.msisdn.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_positional_resolution_via_mapping() {
        let attributes = attrs(&[
            ("customer_name", "John"),
            ("order_number", "ORD-1"),
            ("pickup_location", "Store"),
        ]);
        let parameters = attrs(&[
            ("1", "customer_name"),
            ("2", "order_number"),
            ("3", "pickup_location"),
        ]);
        assert_eq!(
            resolve_placeholders(
                "Hello {{1}}, order {{2}} ready at {{3}}",
                &attributes,
                &parameters
            ),
            "Hello John, order ORD-1 ready at Store"
        );
    }

    #[test]
    fn test_legacy_param_fallback() {
        let attributes = attrs(&[("param_1", "Maria")]);
        assert_eq!(
            resolve_placeholders("Hi {{1}}", &attributes, &HashMap::new()),
            "Hi Maria"
        );
    }

    #[test]
    fn test_mapping_wins_over_legacy_key() {
        let attributes = attrs(&[("param_1", "legacy"), ("first_name", "Ana")]);
        let parameters = attrs(&[("1", "first_name")]);
        assert_eq!(
            resolve_placeholders("Hi {{1}}", &attributes, &parameters),
            "Hi Ana"
        );
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let attributes = attrs(&[("customer_name", "John")]);
        let parameters = attrs(&[("1", "customer_name")]);
        assert_eq!(
            resolve_placeholders("{{1}} code {{2}}", &attributes, &parameters),
            "John code {{2}}"
        );
    }

    #[test]
    fn test_named_placeholders() {
        let attributes = attrs(&[("city", "Lisbon")]);
        assert_eq!(
            resolve_placeholders("See you in {{city}}", &attributes, &HashMap::new()),
            "See you in Lisbon"
        );
    }

    #[test]
    fn test_unterminated_placeholder_kept() {
        let attributes = attrs(&[("city", "Lisbon")]);
        assert_eq!(
            resolve_placeholders("oops {{city", &attributes, &HashMap::new()),
            "oops {{city"
        );
    }

    #[test]
    fn test_fixed_name_and_phone_tokens() {
        let recipient = Recipient {
            id: "aud_1".into(),
            name: "John".into(),
            msisdn: "+14155552671".into(),
            attributes: HashMap::new(),
            generated_asset_urls: HashMap::new(),
        };
        assert_eq!(
            resolve_for_recipient("{{name}} / {{phone}}", &recipient, &HashMap::new()),
            "John / +14155552671"
        );
    }

    #[test]
    fn test_attribute_overrides_fixed_token() {
        let recipient = Recipient {
            id: "aud_1".into(),
            name: "John".into(),
            msisdn: "+14155552671".into(),
            attributes: attrs(&[("name", "Johnny")]),
            generated_asset_urls: HashMap::new(),
        };
        assert_eq!(
            resolve_for_recipient("Hi {{name}}", &recipient, &HashMap::new()),
            "Hi Johnny"
        );
    }
}
