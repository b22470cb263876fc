//! Sign-in audit rows derived from request headers.

use crate::store::SessionLog;
use axum::http::{HeaderMap, header::USER_AGENT};
use regex::Regex;
use uuid::Uuid;

use super::utils::extract_client_ip;

const UNKNOWN: &str = "unknown";

fn first_match(pattern: &str, haystack: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()
        .and_then(|regex| regex.find(haystack).map(|found| found.as_str().to_string()))
}

fn device_type(user_agent: &str) -> &'static str {
    let lowered = user_agent.to_lowercase();
    if lowered.contains("mobile") {
        "mobile"
    } else if lowered.contains("tablet") {
        "tablet"
    } else {
        "desktop"
    }
}

/// `Name/version` of the first recognised browser token.
fn browser(user_agent: &str) -> String {
    first_match(r"(Chrome|Firefox|Safari|Edge|Opera)/[\d.]+", user_agent)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn operating_system(user_agent: &str) -> String {
    first_match(r"(Windows|Mac|Linux|Android|iOS)", user_agent)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub(super) fn session_log(user_id: Uuid, headers: &HeaderMap) -> SessionLog {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    SessionLog {
        user_id,
        ip_address: extract_client_ip(headers).unwrap_or_else(|| UNKNOWN.to_string()),
        device_type: device_type(&user_agent).to_string(),
        browser: browser(&user_agent),
        os: operating_system(&user_agent),
        user_agent,
    }
}
