//! Token validation policies.

use std::collections::HashSet;

/// Decides whether a request's credential admits it.
pub trait TokenPolicy: Send + Sync {
    fn validate(&self, token: Option<&str>) -> bool;
}

impl<F> TokenPolicy for F
where
    F: Fn(Option<&str>) -> bool + Send + Sync,
{
    fn validate(&self, token: Option<&str>) -> bool {
        self(token)
    }
}

/// Accepts any token from a fixed set. A missing token is rejected.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashSet<String>,
}

impl StaticTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenPolicy for StaticTokens {
    fn validate(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.tokens.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_tokens_accept_known_tokens_only() {
        let policy = StaticTokens::new(["alpha", "beta"]);

        assert!(policy.validate(Some("alpha")));
        assert!(policy.validate(Some("beta")));
        assert!(!policy.validate(Some("gamma")));
        assert!(!policy.validate(Some("")));
        assert!(!policy.validate(None));
    }

    #[test]
    fn closures_are_policies() {
        let policy = |token: Option<&str>| token.is_some_and(|t| t.starts_with("ok-"));

        assert!(policy.validate(Some("ok-123")));
        assert!(!policy.validate(Some("no")));
        assert!(!policy.validate(None));
    }
}
