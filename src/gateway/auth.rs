use axum::http::{HeaderMap, HeaderName, HeaderValue, header::InvalidHeaderValue};
use axum_extra::headers::{self, HeaderMapExt};

pub fn authenticated_headers(auth_token: &str) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut token = HeaderValue::from_str(auth_token)?;
    token.set_sensitive(true);
    let mut map = HeaderMap::new();
    map.insert(HeaderName::from_static("authtoken"), token);
    map.typed_insert(headers::ContentType::json());
    Ok(map)
}
