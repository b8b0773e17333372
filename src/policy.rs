//! Ownership and role-based authorization decisions.
//!
//! Each protected route picks one [`Policy`] and a [`ResourceRef`] taken from its path;
//! [`PolicyEngine::evaluate`] turns that pair plus the caller into a [`Decision`]. The engine
//! keeps no state between calls. Ownership facts are read from the relational store on
//! every check and never cached.

use crate::{
    auth::AuthUser,
    errors::{AuthError, StoreError},
    models::{CommentId, PostId, UserId},
    repository::RepositoryState,
};

/// The outcome of one authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    NotFound,
    TransientError,
}

impl Decision {
    /// Map the decision onto the request's effect: proceed, or abort with the matching error.
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AuthError::Forbidden),
            Decision::NotFound => Err(AuthError::NotFound),
            Decision::TransientError => Err(AuthError::TransientStore(
                "authorization lookup failed".to_string(),
            )),
        }
    }
}

/// The closed set of policy forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Caller acts on their own account.
    SelfOwnership,
    /// Caller acts on a post or comment they created.
    ContentOwnership,
    /// Caller must hold the admin role.
    AdminOnly,
}

/// The resource a route addresses, as parsed from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    User(UserId),
    Post(PostId),
    Comment { post_id: PostId, comment_id: CommentId },
    /// Routes that address no particular resource.
    System,
}

#[derive(Clone)]
pub struct PolicyEngine {
    repo: RepositoryState,
}

impl PolicyEngine {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// evaluate
    ///
    /// Uniform entry point used by the routing layer. A policy paired with a resource it
    /// cannot judge is a routing bug and is denied.
    pub async fn evaluate(&self, user: &AuthUser, policy: Policy, resource: ResourceRef) -> Decision {
        let decision = match (policy, resource) {
            (Policy::SelfOwnership, ResourceRef::User(target)) => self.check_self(user, target).await,
            (Policy::ContentOwnership, ResourceRef::Post(post_id)) => {
                self.check_post_ownership(user, post_id).await
            }
            (Policy::ContentOwnership, ResourceRef::Comment { post_id, comment_id }) => {
                self.check_comment_ownership(user, post_id, comment_id).await
            }
            (Policy::AdminOnly, _) => self.check_admin(user).await,
            (policy, resource) => {
                tracing::error!(?policy, ?resource, "policy cannot be applied to resource");
                Decision::Deny
            }
        };

        if decision != Decision::Allow {
            tracing::info!(
                event = "authz_denied",
                user_id = user.id,
                ?policy,
                ?resource,
                ?decision,
                "Authorization denied"
            );
        }
        decision
    }

    /// Allow iff the path identity is the caller, or the caller is an admin.
    pub async fn check_self(&self, user: &AuthUser, target: UserId) -> Decision {
        if user.id == target || self.is_admin(user).await {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    pub async fn check_post_ownership(&self, user: &AuthUser, post_id: PostId) -> Decision {
        let owner = self.repo.get_post_owner(post_id).await;
        self.owner_decision(user, owner).await
    }

    pub async fn check_comment_ownership(&self, user: &AuthUser, post_id: PostId, comment_id: CommentId) -> Decision {
        let owner = self.repo.get_comment_owner(post_id, comment_id).await;
        self.owner_decision(user, owner).await
    }

    /// Allow iff the caller holds the admin role. A failed role lookup denies.
    pub async fn check_admin(&self, user: &AuthUser) -> Decision {
        if self.is_admin(user).await {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Existence is settled before ownership: a missing resource is `NotFound` for every
    /// caller, admins included.
    async fn owner_decision(&self, user: &AuthUser, owner: Result<UserId, StoreError>) -> Decision {
        match owner {
            Ok(owner) if owner == user.id => Decision::Allow,
            Ok(_) if self.is_admin(user).await => Decision::Allow,
            Ok(_) => Decision::Deny,
            Err(StoreError::NoRows) => Decision::NotFound,
            Err(e) => {
                tracing::error!(error = %e, user_id = user.id, "ownership lookup failed");
                Decision::TransientError
            }
        }
    }

    /// Resolved once per request and cached on the context. A store failure counts as
    /// "not admin" so the ownership comparison still decides.
    async fn is_admin(&self, user: &AuthUser) -> bool {
        user.admin_or_init(|| async {
            match self.repo.is_admin(user.id).await {
                Ok(is_admin) => is_admin,
                Err(e) => {
                    tracing::warn!(error = %e, user_id = user.id, "admin lookup failed, treating as non-admin");
                    false
                }
            }
        })
        .await
    }
}
