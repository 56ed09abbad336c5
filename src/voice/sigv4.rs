//! AWS Signature Version 4 request signing
//!
//! Only what Polly needs: header-based signing of a request with an empty
//! query string and a fully buffered body.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Long-lived or temporary AWS credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// Session token for temporary credentials
    pub session_token: Option<SecretString>,
}

/// A request to be signed
#[derive(Debug)]
pub struct SigningRequest<'a> {
    /// HTTP method
    pub method: &'a str,
    /// Value of the `host` header
    pub host: &'a str,
    /// Absolute, already URI-encoded path
    pub path: &'a str,
    /// Extra headers to sign, besides `host` and `x-amz-date`
    pub headers: &'a [(&'a str, &'a str)],
    /// Request body
    pub payload: &'a [u8],
}

/// Headers to attach to the outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `authorization` header value
    pub authorization: String,
    /// `x-amz-date` header value
    pub amz_date: String,
    /// `x-amz-security-token` header value, for temporary credentials
    pub security_token: Option<String>,
}

/// Sign `request` for `service` in `region` at time `now`
///
/// # Errors
///
/// Returns `Error::Synthesis` if the HMAC key is rejected
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Result<SignedHeaders> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let security_token = credentials
        .session_token
        .as_ref()
        .map(|t| t.expose_secret().to_string());

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("host".to_string(), request.host.to_string()));
    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &security_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{canonical_headers}\n{signed_headers}\n{}",
        request.method,
        request.path,
        hex::encode(Sha256::digest(request.payload)),
    );

    let scope = format!("{date_stamp}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes())),
    );

    let key = signing_key(
        credentials.secret_access_key.expose_secret(),
        &date_stamp,
        region,
        service,
    )?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        security_token,
    })
}

fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return Err(Error::Synthesis("invalid SigV4 signing key".to_string()));
    };
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SecretString::from(
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            ),
            session_token: None,
        }
    }

    #[test]
    fn test_get_vanilla_vector() {
        let request = SigningRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            headers: &[],
            payload: b"",
        };
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let signed =
            sign(&request, &example_credentials(), "us-east-1", "service", now).unwrap();

        assert_eq!(signed.amz_date, "20150830T123600Z");
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(signed.security_token.is_none());
    }

    #[test]
    fn test_session_token_is_signed() {
        let mut credentials = example_credentials();
        credentials.session_token = Some(SecretString::from("token".to_string()));
        let request = SigningRequest {
            method: "POST",
            host: "polly.us-west-2.amazonaws.com",
            path: "/v1/speech",
            headers: &[("Content-Type", "application/json")],
            payload: br#"{"Text":"olleh"}"#,
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let signed = sign(&request, &credentials, "us-west-2", "polly", now).unwrap();

        assert_eq!(signed.security_token.as_deref(), Some("token"));
        assert!(signed.authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"
        ));
        assert!(
            signed
                .authorization
                .contains("Credential=AKIDEXAMPLE/20240102/us-west-2/polly/aws4_request")
        );
    }

    #[test]
    fn test_payload_changes_signature() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let sign_body = |payload: &[u8]| {
            let request = SigningRequest {
                method: "POST",
                host: "polly.us-west-2.amazonaws.com",
                path: "/v1/speech",
                headers: &[],
                payload,
            };
            sign(&request, &example_credentials(), "us-west-2", "polly", now)
                .unwrap()
                .authorization
        };

        assert_ne!(sign_body(b"a"), sign_body(b"b"));
        assert_eq!(sign_body(b"a"), sign_body(b"a"));
    }

    #[test]
    fn test_empty_secret_still_signs() {
        let credentials = Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: SecretString::from(String::new()),
            session_token: None,
        };
        let request = SigningRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            headers: &[],
            payload: b"",
        };
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let signed = sign(&request, &credentials, "us-east-1", "service", now).unwrap();
        assert!(signed.authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
    }
}
