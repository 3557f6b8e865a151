//! Role-gated authorization for admin operations.
//!
//! A decision is made fresh on every call from the caller's identity, the
//! operation's required roles and a single read against a [`PrincipalStore`].
//! Two conditions must both hold for a gated operation:
//!
//! 1. the principal holds at least one baseline admin-tier role
//!    ([`holds_admin_tier`]);
//! 2. the principal holds at least one of the operation's required roles
//!    ([`satisfies_requirement`]).
//!
//! A store failure is returned as [`AuthzError::StoreUnavailable`] and is
//! never folded into a deny.

mod policy;
mod role;
mod store;

use std::sync::Arc;

pub use policy::{Operation, OperationPolicy};
pub use role::{RoleName, RoleSet, ADMIN, MEMBER, SUPER_ADMIN};
pub use store::{
    InMemoryPrincipalStore, PgPrincipalStore, Principal, PrincipalId, PrincipalStore, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No verified principal on the request.
    Unauthenticated,
    /// The store has no record for the principal.
    PrincipalNotFound,
    /// The principal holds no baseline admin-tier role.
    NotAdminTier,
    /// Admin tier held, but none of the operation's required roles.
    InsufficientRole,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::PrincipalNotFound => "principal_not_found",
            DenyReason::NotAdminTier => "not_admin_tier",
            DenyReason::InsufficientRole => "insufficient_role",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("could not determine authorization: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Baseline step: at least one role from the admin tier.
pub fn holds_admin_tier(roles: &RoleSet, baseline: &RoleSet) -> bool {
    roles.intersects(baseline)
}

/// Specific step: at least one of the operation's required roles.
pub fn satisfies_requirement(roles: &RoleSet, required: &RoleSet) -> bool {
    roles.intersects(required)
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PrincipalStore>,
    baseline: Arc<RoleSet>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn PrincipalStore>, baseline: RoleSet) -> Self {
        Self {
            store,
            baseline: Arc::new(baseline),
        }
    }

    pub fn baseline(&self) -> &RoleSet {
        &self.baseline
    }

    pub async fn authorize(
        &self,
        required: &RoleSet,
        caller: Option<&PrincipalId>,
    ) -> Result<Decision, AuthzError> {
        if required.is_empty() {
            return Ok(Decision::Allow);
        }

        let Some(id) = caller else {
            return Ok(Decision::Deny(DenyReason::Unauthenticated));
        };

        let Some(principal) = self.store.find_principal(id).await? else {
            return Ok(Decision::Deny(DenyReason::PrincipalNotFound));
        };

        if !holds_admin_tier(&principal.roles, &self.baseline) {
            return Ok(Decision::Deny(DenyReason::NotAdminTier));
        }

        if !satisfies_requirement(&principal.roles, required) {
            return Ok(Decision::Deny(DenyReason::InsufficientRole));
        }

        Ok(Decision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    struct CountingStore {
        inner: InMemoryPrincipalStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl PrincipalStore for CountingStore {
        async fn find_principal(
            &self,
            id: &PrincipalId,
        ) -> Result<Option<Principal>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_principal(id).await
        }
    }

    struct DownStore;

    #[async_trait]
    impl PrincipalStore for DownStore {
        async fn find_principal(&self, _: &PrincipalId) -> Result<Option<Principal>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    async fn setup(principals: &[(&str, &[&str])]) -> (Authorizer, Arc<CountingStore>) {
        let inner = InMemoryPrincipalStore::new();
        for (id, roles) in principals {
            inner
                .insert(PrincipalId::new(*id), roles.iter().copied().collect())
                .await;
        }
        let store = Arc::new(CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        });
        (Authorizer::new(store.clone(), RoleSet::admin_tier()), store)
    }

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().copied().collect()
    }

    #[tokio::test]
    async fn open_operation_allows_anyone() {
        let (authz, store) = setup(&[("member", &[MEMBER])]).await;
        let open = RoleSet::new();

        assert_eq!(authz.authorize(&open, None).await.unwrap(), Decision::Allow);
        let member = PrincipalId::new("member");
        assert_eq!(authz.authorize(&open, Some(&member)).await.unwrap(), Decision::Allow);
        let ghost = PrincipalId::new("ghost");
        assert_eq!(authz.authorize(&open, Some(&ghost)).await.unwrap(), Decision::Allow);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_operation_allows_even_when_store_is_down() {
        let authz = Authorizer::new(Arc::new(DownStore), RoleSet::admin_tier());
        let id = PrincipalId::new("anyone");
        let decision = assert_ok!(authz.authorize(&RoleSet::new(), Some(&id)).await);
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn unauthenticated_is_denied_without_lookup() {
        let (authz, store) = setup(&[]).await;
        let decision = authz.authorize(&roles(&[ADMIN]), None).await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_principal_is_denied() {
        let (authz, store) = setup(&[]).await;
        let id = PrincipalId::new("auth0|ghost");
        let decision = authz.authorize(&roles(&[ADMIN]), Some(&id)).await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::PrincipalNotFound));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn admin_tier_alone_does_not_grant_super_admin_operations() {
        let (authz, _) = setup(&[("admin", &[ADMIN])]).await;
        let id = PrincipalId::new("admin");
        let decision = authz.authorize(&roles(&[SUPER_ADMIN]), Some(&id)).await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::InsufficientRole));
    }

    #[tokio::test]
    async fn matching_role_is_allowed() {
        let (authz, store) = setup(&[("root", &[ADMIN, SUPER_ADMIN])]).await;
        let id = PrincipalId::new("root");
        let decision = authz.authorize(&roles(&[SUPER_ADMIN]), Some(&id)).await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_admin_fails_baseline_before_matching() {
        let (authz, _) = setup(&[("member", &[MEMBER])]).await;
        let id = PrincipalId::new("member");
        // Even a requirement naming Member is refused without an admin-tier role.
        for required in [roles(&[ADMIN]), roles(&[SUPER_ADMIN, ADMIN]), roles(&[MEMBER])] {
            let decision = authz.authorize(&required, Some(&id)).await.unwrap();
            assert_eq!(decision, Decision::Deny(DenyReason::NotAdminTier));
        }
    }

    #[tokio::test]
    async fn principal_without_roles_is_denied() {
        let (authz, _) = setup(&[("empty", &[])]).await;
        let id = PrincipalId::new("empty");
        let decision = authz.authorize(&roles(&[ADMIN]), Some(&id)).await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotAdminTier));
    }

    #[tokio::test]
    async fn unknown_required_roles_never_match() {
        let (authz, _) = setup(&[("admin", &[ADMIN])]).await;
        let id = PrincipalId::new("admin");
        let decision = authz
            .authorize(&roles(&["Auditor", "admin"]), Some(&id))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::InsufficientRole));
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_deny() {
        let authz = Authorizer::new(Arc::new(DownStore), RoleSet::admin_tier());
        let id = PrincipalId::new("admin");
        let err = assert_err!(authz.authorize(&roles(&[ADMIN]), Some(&id)).await);
        assert!(matches!(err, AuthzError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn baseline_is_configurable() {
        let inner = InMemoryPrincipalStore::new();
        inner
            .insert(PrincipalId::new("ops"), roles(&["Operator"]))
            .await;
        let authz = Authorizer::new(Arc::new(inner), roles(&["Operator"]));
        let id = PrincipalId::new("ops");
        let decision = authz.authorize(&roles(&["Operator"]), Some(&id)).await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }
}
