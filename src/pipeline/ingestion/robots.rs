//! robots.txt parsing and per-domain compliance checks.

use reqwest::header::USER_AGENT;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

/// Parsed robots.txt rules, grouped per user-agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    agents: HashMap<String, AgentRules>,
    /// Rules for the `*` wildcard agent
    default_rules: AgentRules,
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl RobotsRules {
    /// Parse robots.txt content. Unknown directives are ignored.
    pub fn parse(content: &str) -> Self {
        fn flush(rules: &mut RobotsRules, agents: &mut Vec<String>, group: &mut AgentRules) {
            for agent in agents.drain(..) {
                if agent == "*" {
                    rules.default_rules = group.clone();
                } else {
                    rules.agents.insert(agent, group.clone());
                }
            }
            *group = AgentRules::default();
        }

        let mut rules = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current = AgentRules::default();
        let mut in_group = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if in_group {
                        flush(&mut rules, &mut current_agents, &mut current);
                        in_group = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_group = true;
                    if !value.is_empty() {
                        current.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    in_group = true;
                    if !value.is_empty() {
                        current.allow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        flush(&mut rules, &mut current_agents, &mut current);

        rules
    }

    /// Check whether a path is allowed for a user-agent.
    ///
    /// Allow rules take precedence over disallow rules; an agent with no
    /// matching group falls back to the wildcard rules.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent = user_agent.to_lowercase();
        let rules = self
            .agents
            .get(&agent)
            .or_else(|| {
                self.agents
                    .iter()
                    .find(|(name, _)| agent.contains(name.as_str()))
                    .map(|(_, r)| r)
            })
            .unwrap_or(&self.default_rules);

        if rules.allow.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        !rules.disallow.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Per-domain robots.txt cache.
///
/// Fetches and parses robots.txt at most once per domain for the process
/// lifetime; the cache is only invalidated through [`RobotsChecker::clear_cache`].
pub struct RobotsChecker {
    user_agent: String,
    timeout: Duration,
    cache: Mutex<HashMap<String, Option<RobotsRules>>>,
}

impl RobotsChecker {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(10),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a URL may be crawled.
    ///
    /// A missing or unfetchable robots.txt allows everything (fail open).
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let domain = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut cache = self.cache.lock().await;
        if !cache.contains_key(&domain) {
            let fetched = self.fetch_robots(parsed.scheme(), &domain).await;
            cache.insert(domain.clone(), fetched);
        }

        match cache.get(&domain).and_then(|r| r.as_ref()) {
            Some(rules) => rules.is_allowed(&self.user_agent, parsed.path()),
            None => true,
        }
    }

    async fn fetch_robots(&self, scheme: &str, domain: &str) -> Option<RobotsRules> {
        let robots_url = format!("{}://{}/robots.txt", scheme, domain);
        let client = reqwest::Client::new();

        let response = client
            .get(&robots_url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => Some(RobotsRules::parse(&body)),
                Err(e) => {
                    warn!("Failed to read robots.txt for {}: {}", domain, e);
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to fetch robots.txt for {}: {}", domain, e);
                None
            }
        }
    }

    /// Drop all cached robots.txt results.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
