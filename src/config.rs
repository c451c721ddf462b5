/// Default maximum size of a request body.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration for a [`Router`](crate::Router).
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) prefix: String,
    pub(crate) body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "/".into(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    /// The path the router is mounted at. Only requests whose path starts with it are routed.
    ///
    /// The prefix is normalised to always begin and end with `/`, so `"api"`, `"/api"` and `"/api/"` are equivalent.
    pub fn prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = normalise_prefix(prefix.as_ref());
        self
    }

    /// The maximum number of bytes accepted for a request body. Larger bodies are rejected with `413 Payload Too Large`.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn get_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get_body_limit(&self) -> usize {
        self.body_limit
    }
}

fn normalise_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalised() {
        assert_eq!(Config::new().get_prefix(), "/");
        assert_eq!(Config::new().prefix("").get_prefix(), "/");
        assert_eq!(Config::new().prefix("api").get_prefix(), "/api/");
        assert_eq!(Config::new().prefix("/api").get_prefix(), "/api/");
        assert_eq!(Config::new().prefix("/api/v1/").get_prefix(), "/api/v1/");
    }
}
