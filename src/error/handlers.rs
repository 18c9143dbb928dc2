//! Advisory diagnostics for requests that could not be completed
//!
//! These never fail an operation on their own. They turn "the request died"
//! into a hint a user can act on: wrong scheme, mixed content, missing
//! credential headers on the registry side, or plain connectivity.

use reqwest::header::HeaderMap;
use std::fmt;
use url::Url;

const ALLOW_CREDENTIALS_HEADER: &str = "access-control-allow-credentials";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDiagnostic {
    /// Plain http registry reached from a secure page
    MixedContent { url: String },
    /// The URL has no http(s) scheme at all
    IncorrectUrl { url: String },
    /// Credentials were sent but the registry did not allow them
    MissingAllowCredentials { origin: String },
    /// Anything else: offline, CORS, DNS...
    Connectivity { page_origin: String },
}

impl RequestDiagnostic {
    /// Classify a failed request.
    ///
    /// `page_origin` is the origin the requests are issued from; a secure
    /// (`https`) origin talking to an `http://` registry is mixed content.
    pub fn classify(
        url: &str,
        with_credentials: bool,
        headers: &HeaderMap,
        page_origin: Option<&Url>,
    ) -> Self {
        let page_is_secure = page_origin.is_some_and(|origin| origin.scheme() == "https");

        if url.starts_with("http://") && page_is_secure {
            return RequestDiagnostic::MixedContent { url: url.to_string() };
        }
        if url.is_empty() || !url.starts_with("http") {
            return RequestDiagnostic::IncorrectUrl { url: url.to_string() };
        }
        if with_credentials && !headers.contains_key(ALLOW_CREDENTIALS_HEADER) {
            let origin = Url::parse(url)
                .map(|parsed| parsed.origin().ascii_serialization())
                .unwrap_or_else(|_| url.to_string());
            return RequestDiagnostic::MissingAllowCredentials { origin };
        }

        RequestDiagnostic::Connectivity {
            page_origin: page_origin
                .map(|origin| origin.origin().ascii_serialization())
                .unwrap_or_else(|| "<unknown origin>".to_string()),
        }
    }

    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RequestDiagnostic::MixedContent { .. } => "MIXED_CONTENT",
            RequestDiagnostic::IncorrectUrl { .. } => "INCORRECT_URL",
            RequestDiagnostic::MissingAllowCredentials { .. } => "MISSING_ALLOW_CREDENTIALS",
            RequestDiagnostic::Connectivity { .. } => "CONNECTIVITY",
        }
    }
}

impl fmt::Display for RequestDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestDiagnostic::MixedContent { url } => write!(
                f,
                "Mixed content: the registry `{}` is served over http while the page is secure",
                url
            ),
            RequestDiagnostic::IncorrectUrl { url } => {
                write!(f, "Incorrect registry URL `{}`: it must start with http:// or https://", url)
            }
            RequestDiagnostic::MissingAllowCredentials { origin } => write!(
                f,
                "The `Access-Control-Allow-Credentials` header in the response is missing and must be set to `true` when the request's credentials mode is on. Origin `{}` is therefore not allowed access.",
                origin
            ),
            RequestDiagnostic::Connectivity { page_origin } => write!(
                f,
                "An error occurred: check your connection and your registry must have `Access-Control-Allow-Origin` header set to `{}`",
                page_origin
            ),
        }
    }
}
