//! Message names and protocol timeouts.

use std::time::Duration;

use crate::method::Method;

/// Default time a forwarded call waits for its response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a logon instruction waits for `logon-response`.
pub const LOGON_TIMEOUT: Duration = Duration::from_secs(30);

/// Time the control process waits for a freshly spawned execution
/// process to announce itself with [`READY`].
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Control → execution: `(oauthConfig, accessToken)`.
pub const LOGON_REQUEST: &str = "logon-request";

/// Execution → control: `(error|null, user)`.
pub const LOGON_RESPONSE: &str = "logon-response";

/// Execution → control: the execution side is serving requests.
pub const READY: &str = "ready";

/// Lower bound of the request id space.
pub const REQUEST_ID_MIN: u64 = 10_000_000;

/// Upper bound (inclusive) of the request id seed range.
pub const REQUEST_ID_MAX: u64 = 99_999_999;

/// Name of the one-shot message answering request `id` of `method`.
pub fn response_name(method: Method, id: u64) -> String {
    format!("{}-{id}-response", method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_name_format() {
        assert_eq!(
            response_name(Method::GetPresence, 12345678),
            "getPresence-12345678-response"
        );
        assert_eq!(response_name(Method::Logout, 1), "logout-1-response");
    }

    #[test]
    fn default_timeouts() {
        assert_eq!(REQUEST_TIMEOUT, Duration::from_secs(30));
        assert_eq!(LOGON_TIMEOUT, Duration::from_secs(30));
    }
}
