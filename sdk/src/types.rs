//! Route types exchanged between plugins and the host

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method of a registered route
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An externally visible endpoint a plugin exposes through the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    /// Name of the plugin that registered the route
    pub owner: String,
    #[serde(default)]
    pub summary: String,
}

impl Route {
    /// Create a new route owned by `owner`
    pub fn new(method: HttpMethod, path: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            owner: owner.into(),
            summary: String::new(),
        }
    }

    /// Attach a one-line description
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Whether two routes claim the same method and path
    pub fn collides_with(&self, other: &Route) -> bool {
        self.method == other.method && self.path == other.path
    }
}
