//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; the
//! Crawl-delay extension is parsed here since the matcher ignores it.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content; empty means allow all
    content: String,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is absent or could not be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns true if there are no rules to apply
    pub fn is_permissive(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given product token
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `agent` - The crawler's product token (e.g. `tribeca-insights`)
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.is_permissive() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Gets the Crawl-delay declared for an agent, in seconds
    ///
    /// A group naming the agent takes precedence over the `*` group.
    /// Consecutive `User-agent` lines share one group.
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        if self.is_permissive() {
            return None;
        }

        let agent = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_agent_lines = false;
        let mut for_agent = None;
        let mut for_wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !in_agent_lines {
                    group.clear();
                }
                group.push(value.to_lowercase());
                in_agent_lines = true;
                continue;
            }
            in_agent_lines = false;

            if key != "crawl-delay" {
                continue;
            }
            let Ok(delay) = value.parse::<f64>() else {
                continue;
            };

            if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                for_agent = for_agent.or(Some(delay));
            } else if group.iter().any(|ua| ua == "*") {
                for_wildcard = for_wildcard.or(Some(delay));
            }
        }

        for_agent.or(for_wildcard)
    }
}
