//! Caller identity as produced by the authentication layer.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::ANONYMOUS_PRINCIPAL;

/// The authenticated (or anonymous) caller of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub principal: String,
    pub groups: BTreeSet<String>,
    pub claims: Map<String, Value>,
}

impl Identity {
    pub fn new(principal: impl Into<String>, groups: impl IntoIterator<Item = String>) -> Self {
        Self {
            principal: principal.into(),
            groups: groups.into_iter().collect(),
            claims: Map::new(),
        }
    }

    /// Identity used when the request carries no token.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_PRINCIPAL, std::iter::empty())
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal == ANONYMOUS_PRINCIPAL
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}
