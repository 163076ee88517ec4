use std::time::Duration;

/// What kind of resource a fetch is for. Robots.txt fetches are exempt
/// from the frontier's politeness delay (they aren't a "visit") but
/// still go through the same bounded client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchType {
    RobotsTxt,
    Page,
}

/// Coarse timing breakdown for one fetch attempt.
///
/// `dns` is measured with an explicit resolve before the request is
/// issued. reqwest doesn't expose a connect/TLS handshake sub-timer
/// through its public client API, so those phases are folded into
/// `total` rather than guessed at.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTiming {
    pub dns: Option<Duration>,
    pub total: Duration,
}

/// Outcome of a single fetch attempt (after following redirects).
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        final_url: String,
        status_code: u16,
        content_type: String,
        body: Vec<u8>,
        redirect_count: u32,
        timing: FetchTiming,
    },
    /// Real HTTP status code outside the 2xx range, or a redirect that
    /// couldn't be resolved into a success.
    HttpError {
        status_code: u16,
        timing: FetchTiming,
    },
    /// Connection-level failure: DNS, refused, reset, TLS handshake.
    ConnectionError { message: String, timing: FetchTiming },
    /// Request exceeded the total or connect timeout.
    Timeout { timing: FetchTiming },
    /// Redirect chain exceeded the cap or looped back on itself.
    RedirectError { message: String, timing: FetchTiming },
    /// Anything else reqwest surfaces that doesn't fit the above.
    GenericError { message: String, timing: FetchTiming },
}

impl FetchOutcome {
    /// The status code recorded for this outcome, using the synthetic
    /// 900/901/902 range for non-HTTP failures so a single integer
    /// column can carry every outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            FetchOutcome::Success { status_code, .. } => *status_code,
            FetchOutcome::HttpError { status_code, .. } => *status_code,
            FetchOutcome::ConnectionError { .. } => 901,
            FetchOutcome::Timeout { .. } => 902,
            FetchOutcome::RedirectError { .. } | FetchOutcome::GenericError { .. } => 900,
        }
    }

    pub fn timing(&self) -> FetchTiming {
        match self {
            FetchOutcome::Success { timing, .. }
            | FetchOutcome::HttpError { timing, .. }
            | FetchOutcome::ConnectionError { timing, .. }
            | FetchOutcome::Timeout { timing, .. }
            | FetchOutcome::RedirectError { timing, .. }
            | FetchOutcome::GenericError { timing, .. } => *timing,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Error label for the fetch-error metrics, `None` for successful
    /// fetches. 4xx responses are labeled `client_response_error`; any
    /// other non-2xx status is labeled `http_<code>` so a single server
    /// outage doesn't get folded into a generic bucket.
    pub fn error_type(&self) -> Option<String> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Timeout { .. } => Some("timeout".to_string()),
            FetchOutcome::ConnectionError { .. } => Some("connection_error".to_string()),
            FetchOutcome::RedirectError { .. } | FetchOutcome::GenericError { .. } => {
                Some("generic_error".to_string())
            }
            FetchOutcome::HttpError { status_code, .. } if (400..500).contains(status_code) => {
                Some("client_response_error".to_string())
            }
            FetchOutcome::HttpError { status_code, .. } => Some(format!("http_{}", status_code)),
        }
    }
}
