//! Parsing of robots.txt content: allow/disallow decisions via the
//! `robotstxt` crate, plus a hand-rolled `Crawl-delay` extractor since
//! that crate doesn't expose one.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permissive default used when robots.txt is missing, unreachable,
    /// or came back non-2xx.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Raw robots.txt body, empty for the allow-all policy. Used to
    /// persist the fetched body into the durable KVC cache.
    pub fn raw(&self) -> &str {
        &self.content
    }

    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Extracts a `Crawl-delay` value (in seconds) for `user_agent`.
    ///
    /// Robots.txt groups a run of `User-agent:` lines followed by rules
    /// until the next `User-agent:` line starts a new group. We look
    /// for a group whose agent list contains `user_agent`'s product
    /// token first, falling back to a `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.content.is_empty() {
            return None;
        }
        parse_crawl_delay(&self.content, user_agent)
    }
}

fn product_token(user_agent: &str) -> String {
    user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .split_whitespace()
        .next()
        .unwrap_or(user_agent)
        .to_ascii_lowercase()
}

fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let target = product_token(user_agent);
    let mut entries: Vec<(String, f64)> = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut group_closed = true;

    for raw_line in content.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                if group_closed {
                    current_agents.clear();
                    group_closed = false;
                }
                current_agents.push(value.to_ascii_lowercase());
            }
            "crawl-delay" => {
                group_closed = true;
                if let Ok(delay) = value.parse::<f64>() {
                    for agent in &current_agents {
                        entries.push((agent.clone(), delay));
                    }
                }
            }
            _ => {
                group_closed = true;
            }
        }
    }

    entries
        .iter()
        .find(|(agent, _)| *agent == target)
        .or_else(|| entries.iter().find(|(agent, _)| agent == "*"))
        .map(|(_, delay)| *delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "TestBot"));
    }

    #[test]
    fn test_parse_disallow_all() {
        let content = "User-agent: *\nDisallow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/", "TestBot"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let content = "User-agent: *\nDisallow: /private\nAllow: /private/public";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("/", "TestBot"));
        assert!(!robots.is_allowed("/private", "TestBot"));
        assert!(robots.is_allowed("/private/public", "TestBot"));
    }

    #[test]
    fn test_invalid_robots_txt_falls_back_to_allow() {
        let content = "This is not valid robots.txt {{{";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("/any/path", "TestBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let content = "User-agent: *\nCrawl-delay: 10\nDisallow: /admin";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("SumiRipple"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent_preferred() {
        let content = "User-agent: SumiRipple\nCrawl-delay: 2\n\nUser-agent: *\nCrawl-delay: 10";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("SumiRipple/2.0"), Some(2.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_none_when_absent() {
        let content = "User-agent: *\nDisallow: /admin";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("SumiRipple"), None);
    }

    #[test]
    fn test_crawl_delay_grouped_agents() {
        let content = "User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 5";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("BotA"), Some(5.0));
        assert_eq!(robots.crawl_delay("BotB"), Some(5.0));
    }

    #[test]
    fn test_crawl_delay_comments_and_blanks_only_allows_all() {
        let content = "# just a comment\n\n   \n# another";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed("/anything", "TestBot"));
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_empty_robots_txt() {
        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed("/any/path", "TestBot"));
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }
}
