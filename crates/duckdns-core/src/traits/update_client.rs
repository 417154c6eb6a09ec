// # Update Client Trait
//
// Defines the interface for issuing the provider's update call.
//
// ## Classification
//
// The provider answers with an ASCII body: `OK` on success, `KO` on
// rejection. Implementations classify in this order:
//
// 1. Body contains `OK` → ok, detail "OK"
// 2. Body contains `KO` → not ok, detail "KO"
// 3. HTTP status 200 → ok, detail "HTTP 200"
// 4. Otherwise → not ok, detail "HTTP <code>"
//
// Transport errors map to not ok with detail `ERROR: <message>`.
//
// ## Security
//
// The token MUST NOT appear in any detail string, log line, or error.
// Use [`redact_token`] before emitting anything derived from the
// request URL.

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Classified result of one update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Whether the provider accepted the update
    pub ok: bool,

    /// Classification detail ("OK", "KO", "HTTP 200", "ERROR: ...")
    pub detail: String,
}

impl UpdateOutcome {
    /// Accepted update
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    /// Rejected or failed update
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Trait for provider update client implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and reuse one HTTP client across
/// ticks to amortise connection pools.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    /// Issue the update call for `domains` with the plaintext `token`
    ///
    /// `ip` carries the operator-fixed address when configured; when
    /// `None` the provider infers the address from the request source.
    ///
    /// Never returns an error: transport failures are classified into
    /// the outcome so the engine has a single audit path.
    async fn update(&self, domains: &[String], token: &str, ip: Option<Ipv4Addr>) -> UpdateOutcome;
}

/// Replace `token=<value>` with `token=***` in a diagnostic string
///
/// Applied to every string that may have been derived from the update URL
/// before it reaches a log line or audit entry.
pub fn redact_token(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("token=") {
        let value_start = pos + "token=".len();
        out.push_str(&rest[..value_start]);
        out.push_str("***");
        let tail = &rest[value_start..];
        let value_end = tail
            .find(|c: char| c == '&' || c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[value_end..];
    }
    out.push_str(rest);
    out
}
