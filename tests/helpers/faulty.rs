use acl_aggregator::aggregator::services::{
    AclRepository, RoleAssignmentCrudEventHandler, RoleAssignmentRepository, ServiceResult,
};
use acl_aggregator::aggregator::types::{Acl, ResourceSelector, RoleAssignment};
use acl_aggregator::errors::AggregatorError;
use acl_aggregator::storage::{self, SeaOrmStore};
use async_trait::async_trait;
use sea_orm::DbErr;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// ACL store that fails the first `failing_inserts` inserts and can slow
/// down the selector lookup. Everything else goes to the real store.
pub struct FaultyAcls {
    inner: Arc<SeaOrmStore>,
    failing_inserts: AtomicUsize,
    insert_attempts: AtomicUsize,
    selector_delay: Option<Duration>,
}

impl FaultyAcls {
    pub fn new(inner: Arc<SeaOrmStore>) -> Self {
        Self {
            inner,
            failing_inserts: AtomicUsize::new(0),
            insert_attempts: AtomicUsize::new(0),
            selector_delay: None,
        }
    }

    pub fn failing_inserts(self, count: usize) -> Self {
        self.failing_inserts.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_selector_delay(mut self, delay: Duration) -> Self {
        self.selector_delay = Some(delay);
        self
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AclRepository for FaultyAcls {
    async fn insert_all_ignoring_duplicates(&self, acls: &[Acl]) -> ServiceResult<u64> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(AggregatorError::Db(DbErr::Custom(
                "injected insert failure".to_string(),
            )));
        }
        self.inner.insert_all_ignoring_duplicates(acls).await
    }

    async fn delete_by_role_assignment_id(&self, role_assignment_id: &str) -> ServiceResult<u64> {
        self.inner.delete_by_role_assignment_id(role_assignment_id).await
    }

    async fn delete_by_role_assignment_id_and_resource_selectors(
        &self,
        role_assignment_id: &str,
        selectors: &HashSet<ResourceSelector>,
    ) -> ServiceResult<u64> {
        self.inner
            .delete_by_role_assignment_id_and_resource_selectors(role_assignment_id, selectors)
            .await
    }

    async fn delete_by_role_assignment_id_and_implicit_for_scope(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<u64> {
        self.inner
            .delete_by_role_assignment_id_and_implicit_for_scope(role_assignment_id)
            .await
    }

    async fn delete_by_role_assignment_id_and_permissions(
        &self,
        role_assignment_id: &str,
        permissions: &HashSet<String>,
    ) -> ServiceResult<u64> {
        self.inner
            .delete_by_role_assignment_id_and_permissions(role_assignment_id, permissions)
            .await
    }

    async fn delete_by_role_assignment_id_and_principals(
        &self,
        role_assignment_id: &str,
        principals: &HashSet<String>,
    ) -> ServiceResult<u64> {
        self.inner
            .delete_by_role_assignment_id_and_principals(role_assignment_id, principals)
            .await
    }

    async fn delete_acls(&self, acls: &[Acl]) -> ServiceResult<u64> {
        self.inner.delete_acls(acls).await
    }

    async fn get_distinct_resource_selectors_in_acls(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<ResourceSelector>> {
        if let Some(delay) = self.selector_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner
            .get_distinct_resource_selectors_in_acls(role_assignment_id)
            .await
    }

    async fn get_distinct_permissions_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>> {
        self.inner
            .get_distinct_permissions_in_acls_for_role_assignment(role_assignment_id)
            .await
    }

    async fn get_distinct_principals_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>> {
        self.inner
            .get_distinct_principals_in_acls_for_role_assignment(role_assignment_id)
            .await
    }

    async fn get_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<Vec<Acl>> {
        self.inner.get_acls_for_role_assignment(role_assignment_id).await
    }

    async fn get_distinct_role_assignment_ids(&self) -> ServiceResult<HashSet<String>> {
        self.inner.get_distinct_role_assignment_ids().await
    }

    async fn has_access(&self, acl_query_string: &str) -> ServiceResult<bool> {
        self.inner.has_access(acl_query_string).await
    }
}

/// CRUD hook that records each call together with how many ACL rows the
/// assignment still had at that moment.
pub struct RecordingCrudEvents {
    store: Arc<SeaOrmStore>,
    pub calls: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingCrudEvents {
    pub fn new(store: Arc<SeaOrmStore>) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String, usize)> {
        self.calls.lock().expect("poisoned").clone()
    }

    async fn record(&self, kind: &str, role_assignment_id: &str) -> ServiceResult<()> {
        let rows = self
            .store
            .get_acls_for_role_assignment(role_assignment_id)
            .await?
            .len();
        self.calls.lock().expect("poisoned").push((
            kind.to_string(),
            role_assignment_id.to_string(),
            rows,
        ));
        Ok(())
    }
}

#[async_trait]
impl RoleAssignmentCrudEventHandler for RecordingCrudEvents {
    async fn handle_role_assignment_create(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<()> {
        self.record("create", &role_assignment.id).await
    }

    async fn handle_role_assignment_delete(&self, role_assignment_id: &str) -> ServiceResult<()> {
        self.record("delete", role_assignment_id).await
    }
}

/// Assignment store that writes `late` and its rows right after the enabled
/// assignments have been listed, the way the event driver would if the
/// assignment were created while a reconciliation pass is running.
pub struct LateRoleAssignments {
    inner: Arc<SeaOrmStore>,
    late: RoleAssignment,
    late_rows: Vec<Acl>,
}

impl LateRoleAssignments {
    pub fn new(inner: Arc<SeaOrmStore>, late: RoleAssignment, late_rows: Vec<Acl>) -> Self {
        Self {
            inner,
            late,
            late_rows,
        }
    }
}

#[async_trait]
impl RoleAssignmentRepository for LateRoleAssignments {
    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<RoleAssignment>> {
        RoleAssignmentRepository::find_by_id(&*self.inner, id).await
    }

    async fn find_by_identifier_and_scope(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<RoleAssignment>> {
        self.inner
            .find_by_identifier_and_scope(identifier, scope_identifier)
            .await
    }

    async fn find_enabled_by_resource_group(
        &self,
        resource_group_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        self.inner
            .find_enabled_by_resource_group(resource_group_identifier, scope_identifier)
            .await
    }

    async fn find_enabled_by_role(
        &self,
        role_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        self.inner
            .find_enabled_by_role(role_identifier, scope_identifier)
            .await
    }

    async fn find_enabled_by_user_group(
        &self,
        user_group_identifier: &str,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        self.inner
            .find_enabled_by_user_group(user_group_identifier)
            .await
    }

    async fn find_all_enabled(&self) -> ServiceResult<Vec<RoleAssignment>> {
        let listed = self.inner.find_all_enabled().await?;
        storage::upsert_role_assignment(self.inner.connection(), &self.late).await?;
        self.inner
            .insert_all_ignoring_duplicates(&self.late_rows)
            .await?;
        Ok(listed)
    }
}
