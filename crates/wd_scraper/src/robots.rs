use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::ratelimit::RateLimiter;

/// Fetches and evaluates robots.txt for the `User-agent: *` group. Every
/// failure mode fails open: an unreachable or malformed robots.txt never
/// blocks a scrape.
pub struct RobotsChecker {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    user_agent: String,
}

impl RobotsChecker {
    pub fn new(
        client: reqwest::Client,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
        user_agent: String,
    ) -> Self {
        Self {
            client,
            limiter,
            timeout,
            user_agent,
        }
    }

    /// True when robots.txt permits fetching `url` (or cannot be consulted).
    pub async fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return true,
        };
        let robots_url = format!("{}/robots.txt", parsed.origin().ascii_serialization());
        self.limiter.wait(&robots_url).await;

        let response = self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await;
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            // Non-2xx (404 and friends) means no policy; errors fail open.
            _ => return true,
        };
        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => return true,
        };

        let path = if parsed.path().is_empty() {
            "/"
        } else {
            parsed.path()
        };
        let allowed = path_allowed(&body, path);
        if !allowed {
            debug!(url, "disallowed by robots.txt");
        }
        allowed
    }
}

/// Evaluate the `User-agent: *` Disallow directives against `path`. Each
/// directive becomes an anchored prefix pattern with `*` as the only
/// wildcard; everything else is matched literally.
pub fn path_allowed(robots_txt: &str, path: &str) -> bool {
    let mut in_wildcard_group = false;
    for line in robots_txt.lines() {
        let line = line.trim();
        if let Some(agent) = strip_directive(line, "user-agent") {
            in_wildcard_group = agent.contains('*');
            continue;
        }
        if !in_wildcard_group {
            continue;
        }
        if let Some(disallow) = strip_directive(line, "disallow") {
            if disallow.is_empty() {
                continue;
            }
            let pattern = format!("^{}", escape_with_wildcard(disallow));
            match Regex::new(&pattern) {
                Ok(re) => {
                    if re.is_match(path) {
                        return false;
                    }
                }
                Err(_) => continue,
            }
        }
    }
    true
}

fn strip_directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim())
    } else {
        None
    }
}

fn escape_with_wildcard(directive: &str) -> String {
    directive
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}
