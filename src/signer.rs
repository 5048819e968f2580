//! Request signing for the Uploadcare REST API.
//!
//! The API authenticates requests with an HMAC-SHA1 signature over a
//! canonical request string. The scheme is bit-exact: header names, the
//! order of the signed fields, and the hex encoding are all verified by
//! the server, and the `Date` header value is the same string that goes
//! into the signature.
//!
//! Signed string layout, joined with `\n`:
//!
//! ```text
//! METHOD
//! md5_hex(body or "")
//! content-type
//! date
//! path?query
//! ```
//!
//! Both the file-listing path and the project-info path sign through this
//! one module so the two cannot drift apart.

use std::time::SystemTime;

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE, HeaderMap, HeaderName, HeaderValue};
use sha1::Sha1;
use thiserror::Error;

use crate::config::ProjectCredential;

type HmacSha1 = Hmac<Sha1>;

/// API version negotiated via the Accept header.
pub const API_ACCEPT: &str = "application/vnd.uploadcare-v0.7+json";

/// Content type used for all API requests; part of the signed string.
pub const API_CONTENT_TYPE: &str = "application/json";

/// Errors from building signed headers.
#[derive(Debug, Error)]
pub enum SignError {
    /// The credential is missing its public or secret key.
    #[error("incomplete credential for project {project:?}: publicKey and secretKey are required")]
    IncompleteCredential {
        /// Name of the offending project.
        project: String,
    },

    /// The credential contains bytes that cannot appear in an HTTP header.
    #[error("credential for project {project:?} produces an invalid header value")]
    InvalidHeaderValue {
        /// Name of the offending project.
        project: String,
    },
}

/// Returns the current time formatted as an RFC 7231 HTTP-date.
///
/// The returned string must be passed to [`sign`] verbatim and is emitted
/// unchanged as the `Date` header, keeping signer and header consistent.
#[must_use]
pub fn http_date() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}

/// Builds the full set of authentication headers for one API request.
///
/// `uri` is the path plus query of the request (e.g. `/files/?limit=100`),
/// not the absolute URL. `date` must be an RFC 7231 HTTP-date; pass the
/// same string the request will carry. The result is a pure function of
/// the arguments, so repeated calls with a fixed `date` are identical.
///
/// A `Content-MD5` header is included only when a body is present; the
/// body hash participates in the signature either way (an absent body
/// hashes as the empty string).
///
/// # Errors
///
/// Returns [`SignError::IncompleteCredential`] if the public or secret key
/// is empty, and [`SignError::InvalidHeaderValue`] if a credential cannot
/// be encoded into a header.
pub fn sign(
    credential: &ProjectCredential,
    method: &str,
    uri: &str,
    body: Option<&[u8]>,
    date: &str,
) -> Result<HeaderMap, SignError> {
    if credential.public_key.is_empty() || credential.secret_key.is_empty() {
        return Err(SignError::IncompleteCredential {
            project: credential.name.clone(),
        });
    }

    let content_md5 = hex::encode(Md5::digest(body.unwrap_or_default()));
    let sign_string = format!("{method}\n{content_md5}\n{API_CONTENT_TYPE}\n{date}\n{uri}");

    let mut mac = HmacSha1::new_from_slice(credential.secret_key.as_bytes()).map_err(|_| {
        SignError::IncompleteCredential {
            project: credential.name.clone(),
        }
    })?;
    mac.update(sign_string.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        header_value(
            format!("Uploadcare {}:{signature}", credential.public_key),
            credential,
        )?,
    );
    headers.insert(DATE, header_value(date.to_string(), credential)?);
    headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(API_CONTENT_TYPE));
    if body.is_some() {
        headers.insert(
            HeaderName::from_static("content-md5"),
            header_value(content_md5, credential)?,
        );
    }

    Ok(headers)
}

fn header_value(value: String, credential: &ProjectCredential) -> Result<HeaderValue, SignError> {
    HeaderValue::from_str(&value).map_err(|_| SignError::InvalidHeaderValue {
        project: credential.name.clone(),
    })
}
