// User-friendly error messages
//
// Helpers that turn backend failures into actionable messages instead of
// raw transport errors.

/// Format a connection refused error with helpful suggestions
pub fn connection_refused_error(address: &str) -> String {
    format!(
        "Could not connect to training backend at {}\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • Backend is not running\n\
        • Wrong address in ~/.trainwatch/config.toml\n\
        • Backend crashed or is still starting\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check that the backend is up:\n\
           \x1b[36mcurl http://{}/api/status\x1b[0m\n\n\
        2. Point trainwatch at the right address:\n\
           \x1b[36mexport TRAINWATCH_BACKEND={}\x1b[0m",
        address, address, address
    )
}

/// Format a job control failure. Prefers the backend's detail text and
/// falls back to a generic message.
pub fn job_request_failed(action: &str, detail: &str) -> String {
    if detail.is_empty() {
        format!("Failed to {} training: the backend rejected the request", action)
    } else {
        format!("Failed to {} training: {}", action, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_refused_mentions_address() {
        let msg = connection_refused_error("127.0.0.1:8090");
        assert!(msg.contains("127.0.0.1:8090"));
        assert!(msg.contains("TRAINWATCH_BACKEND"));
    }

    #[test]
    fn test_job_request_failed_uses_detail() {
        let msg = job_request_failed("start", "no GPU available");
        assert!(msg.contains("no GPU available"));

        let generic = job_request_failed("stop", "");
        assert!(generic.contains("rejected the request"));
    }
}
