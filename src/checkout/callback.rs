use serde::Deserialize;

/// Return callback relayed by the shopper's browser, through a query string or
/// a urlencoded form. Every field is untrusted text.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "trackingCode")]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "orderId")]
    pub order_id: Option<String>,
}

impl CallbackPayload {
    /// Strips markup and control characters, blank fields become `None`
    pub fn sanitized(self) -> Self {
        let clean = |field: Option<String>| field.and_then(|raw| sanitize_text(&raw));
        Self {
            status: clean(self.status),
            tracking_code: clean(self.tracking_code),
            id: clean(self.id),
            order_id: clean(self.order_id),
        }
    }
}

fn sanitize_text(raw: &str) -> Option<String> {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() => text.push(' '),
            c => text.push(c),
        }
    }
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::CallbackPayload;

    #[test]
    fn parses_gateway_field_names() {
        let payload: CallbackPayload =
            serde_urlencoded::from_str("status=2&trackingCode=TRK-1&id=TRK-1&orderId=42&order_id=42")
                .unwrap();
        assert_eq!(payload.status.as_deref(), Some("2"));
        assert_eq!(payload.tracking_code.as_deref(), Some("TRK-1"));
        assert_eq!(payload.id.as_deref(), Some("TRK-1"));
        assert_eq!(payload.order_id.as_deref(), Some("42"));
    }

    #[test]
    fn id_is_not_taken_from_tracking_code() {
        let payload: CallbackPayload =
            serde_urlencoded::from_str("status=2&trackingCode=TRK-1&orderId=42").unwrap();
        assert_eq!(payload.id, None);
    }

    #[test]
    fn strips_markup_and_blank_fields() {
        let payload = CallbackPayload {
            status: Some(" 2\n".into()),
            tracking_code: Some("<script>x</script>TRK-1".into()),
            id: Some("   ".into()),
            order_id: Some("4\t2".into()),
        }
        .sanitized();
        assert_eq!(payload.status.as_deref(), Some("2"));
        assert_eq!(payload.tracking_code.as_deref(), Some("xTRK-1"));
        assert_eq!(payload.id, None);
        assert_eq!(payload.order_id.as_deref(), Some("4 2"));
    }
}
