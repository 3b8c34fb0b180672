use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use drm_core::utils::between;

use crate::config::SessionConfig;
use crate::error::LicenseError;
use crate::token::AccessToken;
use crate::transport::{HttpResponse, HttpTransport};

pub const VENDOR_ACCEPT: &str = "application/vnd.xcal.mds.licenseResponse+json; version=1";
pub const VENDOR_CONTENT_TYPE: &str = "application/vnd.xcal.mds.licenseRequest+json; version=1";
pub const GENERIC_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

const VENDOR_LICENSE_FIELD: &[u8] = b"license\":\"";

/**
    Vendor license endpoints, matched by substring of the destination URL in
    order. The more specific environments come first since every host also
    contains `ccp.xcal.tv`.
*/
const VENDOR_ENDPOINTS: [(&str, &str); 3] = [
    ("rogers.ccp.xcal.tv", "https://mds-rogers.ccp.xcal.tv/license"),
    ("qa.ccp.xcal.tv", "https://mds-qa.ccp.xcal.tv/license"),
    ("ccp.xcal.tv", "https://mds.ccp.xcal.tv/license"),
];

/**
    How a challenge is wrapped on the wire.
*/
#[derive(Debug, Clone, Copy)]
pub enum LicenseScheme<'a> {
    /**
        Raw challenge bytes posted as `text/xml`; the response body is the
        license.
    */
    Generic,
    /**
        JSON envelope for the media delivery service. The challenge and the
        content metadata travel base64-encoded; the response carries the
        license in a base64 `license` field.
    */
    Vendor {
        content_metadata: &'a [u8],
        access_token: Option<&'a AccessToken>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VendorLicenseRequest<'a> {
    key_system: &'static str,
    media_usage: &'static str,
    license_request: String,
    content_metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

/**
    Performs license exchanges with bounded retry.

    A 5xx answer is retried after `license_retry_wait_ms` until
    `max_license_attempts` is used up. Any other non-2xx status and every
    transport failure (timeouts included) end the exchange immediately.
*/
pub struct LicenseClient {
    transport: Arc<dyn HttpTransport>,
    max_attempts: u32,
    retry_wait: Duration,
    user_agent: String,
}

impl LicenseClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &SessionConfig) -> Self {
        Self {
            transport,
            max_attempts: config.max_license_attempts.max(1),
            retry_wait: config.retry_wait(),
            user_agent: config.user_agent.clone(),
        }
    }

    /**
        Send `challenge` to `url` and return the license to feed to the
        platform session.
    */
    pub fn acquire(
        &self,
        challenge: &[u8],
        url: &str,
        scheme: LicenseScheme<'_>,
    ) -> Result<Vec<u8>, LicenseError> {
        if url.trim().is_empty() {
            return Err(LicenseError::MissingUrl);
        }

        let license = match scheme {
            LicenseScheme::Generic => {
                let headers = [("Content-Type", GENERIC_CONTENT_TYPE)];
                self.post_with_retry(url, &headers, challenge)?.body
            }
            LicenseScheme::Vendor {
                content_metadata,
                access_token,
            } => {
                let body = vendor_request_body(challenge, content_metadata, access_token)?;
                let headers = [
                    ("Accept", VENDOR_ACCEPT),
                    ("Content-Type", VENDOR_CONTENT_TYPE),
                    ("User-Agent", self.user_agent.as_str()),
                ];
                let response = self.post_with_retry(url, &headers, &body)?;
                extract_vendor_license(&response.body)?
            }
        };

        if license.is_empty() {
            return Err(LicenseError::EmptyResponse);
        }
        Ok(license)
    }

    fn post_with_retry(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, LicenseError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(url, attempt, body_len = body.len(), "sending license request");

            let response = self.transport.post(url, headers, body).inspect_err(|e| {
                warn!(url, attempt, error = %e, "license request failed");
            })?;

            if response.is_success() {
                info!(url, attempt, status = response.status, "license request succeeded");
                return Ok(response);
            }

            warn!(url, attempt, status = response.status, "license request failed");
            if !response.is_server_error() || attempt >= self.max_attempts {
                return Err(LicenseError::Http {
                    status: response.status,
                });
            }

            debug!(
                wait_ms = self.retry_wait.as_millis() as u64,
                "sleeping before next license attempt"
            );
            if !self.retry_wait.is_zero() {
                std::thread::sleep(self.retry_wait);
            }
        }
    }
}

fn vendor_request_body(
    challenge: &[u8],
    content_metadata: &[u8],
    access_token: Option<&AccessToken>,
) -> Result<Vec<u8>, LicenseError> {
    let request = VendorLicenseRequest {
        key_system: "playReady",
        media_usage: "stream",
        license_request: data_encoding::BASE64.encode(challenge),
        content_metadata: data_encoding::BASE64.encode(content_metadata),
        access_token: access_token.map(AccessToken::as_str),
    };
    serde_json::to_vec(&request).map_err(|e| LicenseError::InvalidLicense(e.to_string()))
}

/**
    License bytes from a vendor response.

    The base64 `license` field is decoded when present; otherwise the body
    is already the license.
*/
fn extract_vendor_license(body: &[u8]) -> Result<Vec<u8>, LicenseError> {
    let Some(encoded) = between(body, VENDOR_LICENSE_FIELD, b"\"") else {
        return Ok(body.to_vec());
    };

    // JSON encoders may escape '/' as "\/".
    let encoded: Vec<u8> = encoded.iter().copied().filter(|&b| b != b'\\').collect();
    data_encoding::BASE64
        .decode(&encoded)
        .map_err(|e| LicenseError::InvalidLicense(format!("license field: {e}")))
}

/**
    Fixed vendor license endpoint for a destination reported by the platform.
*/
pub fn vendor_license_url(destination: &str) -> Option<&'static str> {
    VENDOR_ENDPOINTS
        .iter()
        .find(|(host, _)| destination.contains(host))
        .map(|&(_, endpoint)| endpoint)
}
