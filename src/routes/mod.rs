//! Public/protected route classification.
//!
//! The allow-list is a fixed, ordered table. Entries are either exact paths or
//! segment-aware prefixes; the first matching entry wins and anything that
//! matches nothing is protected.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicPath {
    Exact(String),
    /// Matches the path itself and every sub-path below it
    Prefix(String),
}

impl PublicPath {
    /// Parse one configured entry. A trailing `*` marks a prefix.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return None;
        }
        match raw.strip_suffix('*') {
            Some(prefix) => Some(PublicPath::Prefix(prefix.trim_end_matches('/').to_string())),
            None => Some(PublicPath::Exact(raw.to_string())),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PublicPath::Exact(exact) => path == exact,
            PublicPath::Prefix(prefix) if prefix.is_empty() => true,
            PublicPath::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublicRoutes {
    entries: Vec<PublicPath>,
}

impl PublicRoutes {
    pub fn new(entries: Vec<PublicPath>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PublicPath] {
        &self.entries
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.entries.iter().any(|entry| entry.matches(path)) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }
}

impl Default for PublicRoutes {
    fn default() -> Self {
        use PublicPath::{Exact, Prefix};

        Self::new(vec![
            Exact("/health".into()),
            Prefix("/static".into()),
            Exact("/favicon.ico".into()),
            // auth-callback namespace
            Prefix("/auth".into()),
            Prefix("/api/auth".into()),
            Prefix("/api/bpa-public".into()),
            Exact("/anmelden".into()),
            Exact("/abmelden".into()),
            // token-gated public forms
            Prefix("/bpa-formular".into()),
        ])
    }
}
