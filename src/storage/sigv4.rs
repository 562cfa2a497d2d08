//! AWS Signature Version 4 request signing.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use itertools::Itertools;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// SHA-256 of an empty payload. Every request of the client is body-less.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    region: String,
}

/// Percent-encode everything but unreserved characters (and `/` when `keep_slash` is set).
pub fn uri_encode(s: &str, keep_slash: bool) -> String {
    if keep_slash {
        s.split('/').map(urlencoding::encode).join("/")
    } else {
        urlencoding::encode(s).into_owned()
    }
}

/// Query string with keys sorted and every key/value encoded by [uri_encode].
pub fn canonical_query(pairs: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (uri_encode(k, false), uri_encode(v, false)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn mac(key: &[u8], data: &[u8]) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| Error::Custom(e.to_string()))?;
    mac.update(data);
    Ok(mac)
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    Ok(mac(key, data)?.finalize().into_bytes().to_vec())
}

fn host(url: &Url) -> Result<String, Error> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Custom(format!("{} has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Canonical request and signed header names.
///
/// `headers` must not contain `host`, which is derived from `url`.
/// The query of `url` must already be in canonical form (see [canonical_query]).
pub fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> Result<(String, String), Error> {
    let host = host(url)?;
    let mut headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .chain(std::iter::once(("host".to_string(), host)))
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        url.path(),
        url.query().unwrap_or(""),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    Ok((request, signed_headers))
}

impl Signer {
    pub fn new(credentials: Credentials, region: &str) -> Self {
        Self {
            credentials,
            region: region.to_string(),
        }
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, Error> {
        let secret = format!("AWS4{}", self.credentials.secret_key);
        let key = hmac(secret.as_bytes(), date.as_bytes())?;
        let key = hmac(&key, self.region.as_bytes())?;
        let key = hmac(&key, SERVICE.as_bytes())?;
        hmac(&key, b"aws4_request")
    }

    /// Headers to add to a body-less request so that it is authenticated.
    ///
    /// `headers` are the extra headers sent with the request, they are signed too.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, Error> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);

        let mut signed: Vec<(&str, &str)> = headers.to_vec();
        signed.push(("x-amz-content-sha256", EMPTY_PAYLOAD_HASH));
        signed.push(("x-amz-date", amz_date.as_str()));
        let (request, signed_headers) =
            canonical_request(method, url, &signed, EMPTY_PAYLOAD_HASH)?;

        let string_to_sign = format!(
            "{}\n{}\n{}\n{:x}",
            ALGORITHM,
            amz_date,
            scope,
            Sha256::digest(request.as_bytes())
        );

        let signature = format!(
            "{:x}",
            mac(&self.signing_key(&date)?, string_to_sign.as_bytes())?
                .finalize()
                .into_bytes()
        );

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key, scope, signed_headers, signature
        );

        Ok(vec![
            ("x-amz-content-sha256".to_string(), EMPTY_PAYLOAD_HASH.to_string()),
            ("x-amz-date".to_string(), amz_date),
            ("authorization".to_string(), authorization),
        ])
    }
}
