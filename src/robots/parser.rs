//! Robots.txt parser implementation
//!
//! Only the wildcard agent scope is honored. Within it, `Disallow` prefixes
//! are matched against the URL path (plus `?query`) in document order.

use url::Url;

/// Where a policy snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// Parsed from a robots.txt document served by the host
    Document,
    /// Fetch failed, status was not 2xx, or the document was unusable
    AllowAll,
}

/// Immutable exclusion policy for the target host
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    /// Disallowed path prefixes of the selected scope, in document order
    disallow: Vec<String>,
    source: PolicySource,
}

/// One `User-agent` scope and the prefixes it disallows
#[derive(Debug, Default)]
struct Scope {
    agents: Vec<String>,
    disallow: Vec<String>,
}

impl Scope {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|agent| agent == "*")
    }
}

impl PolicySnapshot {
    /// Creates a permissive snapshot that allows everything
    ///
    /// This is used when robots.txt cannot be fetched or parsed.
    pub fn allow_all() -> Self {
        Self {
            disallow: Vec::new(),
            source: PolicySource::AllowAll,
        }
    }

    /// Parses a robots.txt document
    ///
    /// Consecutive `User-agent` lines form one scope and the last scope
    /// naming `*` is selected. A document with content but no recognizable
    /// directive is treated as malformed and allows everything.
    ///
    /// # Example
    ///
    /// ```
    /// use jobcrawl::robots::PolicySnapshot;
    ///
    /// let policy = PolicySnapshot::parse("User-agent: *\nDisallow: /private\n");
    /// assert!(!policy.is_path_allowed("/private/jobs"));
    /// assert!(policy.is_path_allowed("/jobs"));
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut scopes: Vec<Scope> = Vec::new();
        let mut in_agent_header = false;
        let mut meaningful_lines = 0usize;
        let mut directives = 0usize;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            meaningful_lines += 1;

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    directives += 1;
                    if !in_agent_header {
                        scopes.push(Scope::default());
                        in_agent_header = true;
                    }
                    if let Some(scope) = scopes.last_mut() {
                        scope.agents.push(value.to_string());
                    }
                }
                "disallow" => {
                    directives += 1;
                    in_agent_header = false;
                    // An empty value restricts nothing
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(scope) = scopes.last_mut() {
                        scope.disallow.push(value.to_string());
                    }
                }
                "allow" | "crawl-delay" | "sitemap" | "host" => {
                    directives += 1;
                    in_agent_header = false;
                }
                _ => {}
            }
        }

        if meaningful_lines > 0 && directives == 0 {
            tracing::warn!(
                lines = meaningful_lines,
                "robots.txt has no recognizable directives, allowing all"
            );
            return Self::allow_all();
        }

        let disallow = scopes
            .into_iter()
            .filter(Scope::is_wildcard)
            .last()
            .map(|scope| scope.disallow)
            .unwrap_or_default();

        Self {
            disallow,
            source: PolicySource::Document,
        }
    }

    /// Checks a URL against the policy
    pub fn is_allowed(&self, url: &Url) -> bool {
        match url.query() {
            Some(query) => self.is_path_allowed(&format!("{}?{}", url.path(), query)),
            None => self.is_path_allowed(url.path()),
        }
    }

    /// Checks a path (optionally with `?query`) against the policy
    pub fn is_path_allowed(&self, path: &str) -> bool {
        !self
            .disallow
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Disallowed prefixes of the selected scope
    pub fn disallowed_prefixes(&self) -> &[String] {
        &self.disallow
    }

    pub fn source(&self) -> PolicySource {
        self.source
    }

    /// Whether this snapshot is the fail-open fallback
    pub fn is_fail_open(&self) -> bool {
        self.source == PolicySource::AllowAll
    }
}
