//! Cookie header helpers.

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::Cookie;

/// Value of the first request cookie called `name`.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// Append a `Set-Cookie` header. Unrepresentable cookies are dropped with an error log.
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(_) => tracing::error!(cookie = %cookie.name(), "Cookie is not a valid header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; b=two=="));
        headers.append(header::COOKIE, HeaderValue::from_static("c=3"));

        assert_eq!(request_cookie(&headers, "a").as_deref(), Some("1"));
        assert_eq!(request_cookie(&headers, "b").as_deref(), Some("two=="));
        assert_eq!(request_cookie(&headers, "c").as_deref(), Some("3"));
        assert_eq!(request_cookie(&headers, "d"), None);
    }

    #[test]
    fn test_append_set_cookie() {
        let mut headers = HeaderMap::new();
        append_set_cookie(&mut headers, &Cookie::new("a", "1"));
        append_set_cookie(&mut headers, &Cookie::new("b", "2"));
        let values: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "a=1");
    }
}
