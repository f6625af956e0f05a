//! HTTP GET helper shared by the web loaders.
//!
//! Uses `ureq` for synchronous requests with a per-request timeout. Status
//! and transport failures both map to [`LoadError::Fetch`].

use std::time::Duration;

use super::error::{LoadError, LoadResult};

/// Browser-like user agent; some sites refuse requests without one.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Fetch a URL and return the body as text.
pub fn fetch_text(url: &str, timeout: Duration) -> LoadResult<String> {
    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build();

    tracing::debug!(url, "fetching");

    match agent.get(url).set("Accept-Language", "en-US,en;q=0.8").call() {
        Ok(response) => response.into_string().map_err(|e| LoadError::Fetch {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        }),
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            Err(LoadError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {code}: {preview}"),
            })
        }
        Err(ureq::Error::Transport(transport)) => Err(LoadError::Fetch {
            url: url.to_string(),
            message: transport.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_host_is_fetch_error() {
        let err = fetch_text("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }
}
