//! # Request Signing
//!
//! HMAC-SHA256 request signing in the AWS Signature Version 4 format,
//! used when the client is configured with both an access key and a
//! secret key. The signing scope is fixed: service `para`, region
//! `us-east-1`.
//!
//! The flow follows the SigV4 recipe:
//!
//! 1. build a canonical request (method, encoded path, sorted encoded
//!    query, canonical headers, payload hash);
//! 2. build the string-to-sign from the request hash and credential
//!    scope;
//! 3. derive the signing key by chaining HMACs over date, region,
//!    service, and the `aws4_request` terminator;
//! 4. emit `Authorization` and `X-Amz-Date` headers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::ParaError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "para";
const REGION: &str = "us-east-1";

/// Headers produced by signing a request.
#[derive(Debug)]
pub(crate) struct Signature {
    /// `X-Amz-Date` header value, `yyyyMMddTHHmmssZ`.
    pub amz_date: String,
    /// Full `Authorization` header value.
    pub authorization: String,
}

/// Everything about a request that participates in the signature.
#[derive(Debug)]
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    /// Host header value, including a non-default port if any.
    pub host: &'a str,
    /// Absolute resource path, e.g. `/v1/cats/123`.
    pub path: &'a str,
    /// Query parameters, unencoded.
    pub query: &'a [(String, String)],
    /// `Content-Type` header value, if the request has a body.
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Sign a request with the given key pair at the given instant.
pub(crate) fn sign(
    access_key: &str,
    secret_key: &str,
    req: &SignableRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Signature, ParaError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    // Canonical headers, sorted by (lowercased) name.
    let mut headers: Vec<(&str, String)> = vec![
        ("host", req.host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(ct) = req.content_type {
        headers.push(("content-type", ct.to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let payload_hash = hex::encode(Sha256::digest(req.body));

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        req.method,
        canonical_uri(req.path),
        canonical_query(req.query),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = format!("{date_stamp}/{REGION}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_key(secret_key, &date_stamp)?;
    let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={access_key}/{scope}, \
         SignedHeaders={signed_headers}, Signature={signature}"
    );

    Ok(Signature {
        amz_date,
        authorization,
    })
}

/// Percent-encode each path segment, preserving the `/` separators.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sort query pairs by key then value and percent-encode both sides.
fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Chain of HMACs deriving the per-date signing key.
fn derive_key(secret_key: &str, date_stamp: &str) -> Result<Vec<u8>, ParaError> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, REGION.as_bytes())?;
    let k_service = hmac(&k_region, SERVICE.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ParaError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ParaError::Signing {
        reason: e.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap()
    }

    fn request<'a>(query: &'a [(String, String)], body: &'a [u8]) -> SignableRequest<'a> {
        SignableRequest {
            method: "GET",
            host: "paraio.com",
            path: "/v1/cats/123",
            query,
            content_type: if body.is_empty() {
                None
            } else {
                Some("application/json")
            },
            body,
        }
    }

    #[test]
    fn amz_date_format() {
        let sig = sign("AK", "SK", &request(&[], b""), fixed_now()).unwrap();
        assert_eq!(sig.amz_date, "20240315T123045Z");
    }

    #[test]
    fn authorization_shape() {
        let sig = sign("AK", "SK", &request(&[], b""), fixed_now()).unwrap();
        assert!(sig.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AK/20240315/us-east-1/para/aws4_request"
        ));
        assert!(sig.authorization.contains("SignedHeaders=host;x-amz-date,"));
        let hex_sig = sig
            .authorization
            .rsplit("Signature=")
            .next()
            .expect("signature part");
        assert_eq!(hex_sig.len(), 64);
        assert!(hex_sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_type_joins_signed_headers_with_body() {
        let sig = sign("AK", "SK", &request(&[], b"{}"), fixed_now()).unwrap();
        assert!(sig
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date,"));
    }

    #[test]
    fn signing_is_deterministic() {
        let a = sign("AK", "SK", &request(&[], b"{}"), fixed_now()).unwrap();
        let b = sign("AK", "SK", &request(&[], b"{}"), fixed_now()).unwrap();
        assert_eq!(a.authorization, b.authorization);
    }

    #[test]
    fn body_and_query_change_the_signature() {
        let base = sign("AK", "SK", &request(&[], b""), fixed_now()).unwrap();
        let with_body = sign("AK", "SK", &request(&[], b"{}"), fixed_now()).unwrap();
        assert_ne!(base.authorization, with_body.authorization);

        let q = vec![("page".to_string(), "2".to_string())];
        let with_query = sign("AK", "SK", &request(&q, b""), fixed_now()).unwrap();
        assert_ne!(base.authorization, with_query.authorization);
    }

    #[test]
    fn query_order_does_not_matter() {
        let q1 = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let q2 = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        let s1 = sign("AK", "SK", &request(&q1, b""), fixed_now()).unwrap();
        let s2 = sign("AK", "SK", &request(&q2, b""), fixed_now()).unwrap();
        assert_eq!(s1.authorization, s2.authorization);
    }

    #[test]
    fn canonical_uri_encodes_segments() {
        assert_eq!(canonical_uri("/v1/app:para"), "/v1/app%3Apara");
        assert_eq!(canonical_uri(""), "/");
    }

    #[test]
    fn canonical_query_sorts_and_encodes() {
        let q = vec![
            ("q".to_string(), "name:*".to_string()),
            ("desc".to_string(), "true".to_string()),
        ];
        assert_eq!(canonical_query(&q), "desc=true&q=name%3A%2A");
    }
}
