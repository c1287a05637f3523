//! Repository access decisions.
//!
//! A repository is readable when any one of its mechanisms grants access:
//! the public flag, a shared group, a listed user, or an access expression
//! that evaluates to `true`. Everything else is denied, including
//! expressions that fail to parse or evaluate.

pub mod expression;

use tracing::{debug, error};

use domain::Identity;

use self::expression::Context;
use crate::registry::RegisteredRepository;

/// Mechanism that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Public,
    Group,
    User,
    Expression,
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Pure decision function over an identity and a repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessControlEngine;

impl AccessControlEngine {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `identity` may read `repository`.
    pub fn decide(&self, identity: &Identity, repository: &RegisteredRepository) -> Decision {
        let decision = Self::evaluate(identity, repository);
        debug!(
            repository = %repository.name,
            principal = %identity.principal,
            ?decision,
            "Access decision"
        );
        decision
    }

    fn evaluate(identity: &Identity, repository: &RegisteredRepository) -> Decision {
        if repository.is_public {
            return Decision::Allow(Grant::Public);
        }

        if !identity.groups.is_disjoint(&repository.access_groups) {
            return Decision::Allow(Grant::Group);
        }

        if repository.access_users.contains(&identity.principal) {
            return Decision::Allow(Grant::User);
        }

        match repository.compiled_expression() {
            Some(Ok(expr)) => {
                match expression::evaluate_expr(expr, &Context::new(identity, repository)) {
                    Ok(true) => return Decision::Allow(Grant::Expression),
                    Ok(false) => {}
                    Err(e) => {
                        error!(
                            repository = %repository.name,
                            principal = %identity.principal,
                            "Access expression failed, denying: {}",
                            e
                        );
                    }
                }
            }
            // Reported once when the registry was loaded
            Some(Err(e)) => {
                debug!(repository = %repository.name, "Access expression unusable: {}", e);
            }
            None => {}
        }

        Decision::Deny
    }
}
