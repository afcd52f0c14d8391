//! Form body decoding.
//!
//! URL-encoded and `multipart/form-data` bodies both yield plain
//! `(name, value)` text pairs. Multipart file parts are skipped; only their
//! presence matters to the engine, which still sees the raw body.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use futures_util::stream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEncoding {
    UrlEncoded,
    Multipart { boundary: String },
}

/// Form encoding announced by `Content-Type`, if it is one we decode.
pub fn form_encoding(headers: &HeaderMap) -> Option<FormEncoding> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim();

    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return Some(FormEncoding::UrlEncoded);
    }
    if mime.eq_ignore_ascii_case("multipart/form-data") {
        return multer::parse_boundary(content_type)
            .ok()
            .map(|boundary| FormEncoding::Multipart { boundary });
    }
    None
}

/// Text fields of an already buffered form body, in body order.
///
/// A malformed multipart body yields the fields read before the error.
pub async fn form_fields(encoding: &FormEncoding, body: Bytes) -> Vec<(String, String)> {
    match encoding {
        FormEncoding::UrlEncoded => url::form_urlencoded::parse(&body).into_owned().collect(),
        FormEncoding::Multipart { boundary } => multipart_fields(body, boundary).await,
    }
}

async fn multipart_fields(body: Bytes, boundary: &str) -> Vec<(String, String)> {
    let source = stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(source, boundary);
    let mut fields = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed multipart body");
                break;
            }
        };
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(value) => fields.push((name, value)),
            Err(e) => {
                tracing::debug!(field = %name, error = %e, "Unreadable multipart field");
                break;
            }
        }
    }
    fields
}

/// Value of the first field called `name`.
pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}
