use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Gateway status block (`metaData`).
///
/// The gateway sends `code` as either a string or a number; both are kept
/// as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(deserialize_with = "code_as_string")]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl MetaData {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new("200", "OK")
    }

    pub fn is_ok(&self) -> bool {
        self.code == "200"
    }

    pub fn is_no_content(&self) -> bool {
        self.code == "204"
    }
}

fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected metaData.code: {other}"
        ))),
    }
}

/// How an orchestrated call treats `Empty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyPolicy {
    /// `Empty` means the strategy failed.
    #[default]
    Reject,
    /// Any `Empty` ends the chain.
    Accept,
    /// Only an acknowledged `Empty` ends the chain.
    AcknowledgedOnly,
}

/// Outcome of one logical upstream call.
///
/// Exactly one variant is produced for every call; callers match on all four.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult {
    /// Upstream accepted the request and returned data.
    Success { meta: MetaData, payload: Value },

    /// Upstream reported that there is no data. Not a failure.
    ///
    /// `acknowledged` is set when the gateway answered with `metaData.code`
    /// 200 and an empty `response`, as opposed to a 204 or a body with no
    /// status block at all.
    Empty { reason: String, acknowledged: bool },

    /// A response was received but it is not a success.
    UpstreamError {
        code: String,
        message: String,
        raw_body: Option<String>,
    },

    /// No response could be read.
    TransportError { message: String },
}

impl ApiResult {
    pub fn empty(reason: impl Into<String>) -> Self {
        Self::Empty {
            reason: reason.into(),
            acknowledged: false,
        }
    }

    /// `Empty` backed by an explicit `metaData.code` 200.
    pub fn acknowledged(reason: impl Into<String>) -> Self {
        Self::Empty {
            reason: reason.into(),
            acknowledged: true,
        }
    }

    pub fn upstream_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamError {
            code: code.into(),
            message: message.into(),
            raw_body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    /// `Success`, or an `Empty` the gateway confirmed with code 200.
    pub fn is_acknowledged(&self) -> bool {
        match self {
            Self::Success { .. } => true,
            Self::Empty { acknowledged, .. } => *acknowledged,
            _ => false,
        }
    }

    /// `Success` always counts; `Empty` only as far as `policy` allows.
    pub fn is_acceptable(&self, policy: EmptyPolicy) -> bool {
        match (self, policy) {
            (Self::Success { .. }, _) => true,
            (Self::Empty { .. }, EmptyPolicy::Accept) => true,
            (Self::Empty { acknowledged, .. }, EmptyPolicy::AcknowledgedOnly) => *acknowledged,
            _ => false,
        }
    }

    /// Gateway-style code for this result.
    pub fn code(&self) -> &str {
        match self {
            Self::Success { meta, .. } => &meta.code,
            Self::Empty { acknowledged: true, .. } => "200",
            Self::Empty { .. } => "204",
            Self::UpstreamError { code, .. } => code,
            Self::TransportError { .. } => "500",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { meta, .. } => &meta.message,
            Self::Empty { reason, .. } => reason,
            Self::UpstreamError { message, .. } => message,
            Self::TransportError { message } => message,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Rewrites a `Success` payload; other variants pass through.
    pub fn map_payload(self, f: impl FnOnce(Value) -> Value) -> Self {
        match self {
            Self::Success { meta, payload } => Self::Success {
                meta,
                payload: f(payload),
            },
            other => other,
        }
    }

    /// HTTP status for the inbound response carrying this result.
    ///
    /// `Empty` is a normal business outcome and maps to 200. Upstream errors
    /// keep their numeric code when it is a 4xx/5xx status, otherwise 400.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } | Self::Empty { .. } => 200,
            Self::UpstreamError { code, .. } => match code.parse::<u16>() {
                Ok(status) if (400..=599).contains(&status) => status,
                _ => 400,
            },
            Self::TransportError { .. } => 500,
        }
    }

    /// One-line description used in attempt logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Success { meta, .. } => format!("success ({})", meta.code),
            Self::Empty { reason, .. } => format!("empty ({reason})"),
            Self::UpstreamError { code, message, .. } => format!("upstream error {code}: {message}"),
            Self::TransportError { message } => format!("transport error: {message}"),
        }
    }
}
