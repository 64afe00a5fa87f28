//! The workflow service: one function per user-facing action
//!
//! Every method loads the entity, runs the pure engine, and commits
//! the outcome. The multi-path update carries the entity document plus
//! the issuance side effects, so either everything lands or nothing
//! does.

use crate::{entity_path, history_path, stock_path, ServiceConfig, ServiceError, ServiceResult};
use chrono::Utc;
use serde_json::Value;
use siteflow_engine::WorkflowEngine;
use siteflow_notify::{Dispatcher, Mailer, Outbox, UserDirectory};
use siteflow_store::{push_key, EntityStore, StoreError, StoreEvent, StorePath};
use siteflow_types::{
    Action, ActionKind, ActionPayload, Actor, EngineEvent, ResolveDisposition, SubtaskStatus,
    WorkflowEntity,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The composition layer over store, engine and outbox
pub struct WorkflowService<S> {
    store: Arc<S>,
    engine: WorkflowEngine,
    outbox: Outbox<S>,
    config: ServiceConfig,
}

impl<S: EntityStore> WorkflowService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            outbox: Outbox::new(Arc::clone(&store)),
            store,
            engine: WorkflowEngine::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn outbox(&self) -> &Outbox<S> {
        &self.outbox
    }

    /// Build the notification dispatcher that drains this service's
    /// outbox, using the configured retry policy
    pub fn dispatcher<D, M>(&self, directory: D, mailer: M) -> Dispatcher<S, D, M>
    where
        D: UserDirectory,
        M: Mailer,
    {
        Dispatcher::new(
            self.outbox.clone(),
            directory,
            mailer,
            self.config.dispatcher.clone(),
        )
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Persist a freshly created entity at its owned path
    pub async fn create(&self, entity: WorkflowEntity) -> ServiceResult<WorkflowEntity> {
        let path = entity_path(&entity);
        let value = serde_json::to_value(&entity)?;
        self.store.write(&path, value).await?;
        tracing::info!(entity_id = %entity.id(), path = %path, "entity created");
        Ok(entity)
    }

    /// Load the entity owned by a path
    pub async fn load(&self, path: &StorePath) -> ServiceResult<WorkflowEntity> {
        let value = self
            .store
            .read(path)
            .await?
            .ok_or_else(|| ServiceError::NotFound(path.clone()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Realtime feed of changes at or below a prefix
    pub fn watch(&self, prefix: &StorePath) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe(prefix)
    }

    // ── Action submission ────────────────────────────────────────────

    /// Submit any action against the entity at `path`
    pub async fn execute(
        &self,
        path: &StorePath,
        action: &Action,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        match action.kind {
            ActionKind::Comment | ActionKind::MarkViewed | ActionKind::AcknowledgeRejection => {
                self.execute_merge(path, action, actor).await
            }
            ActionKind::Reopen => self.reopen(path, actor).await,
            _ => self.execute_transition(path, action, actor).await,
        }
    }

    /// Status transition: guarded single commit, no retry. A losing
    /// race surfaces as ConcurrentConflict.
    async fn execute_transition(
        &self,
        path: &StorePath,
        action: &Action,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let current = self
            .store
            .read(path)
            .await?
            .ok_or_else(|| ServiceError::NotFound(path.clone()))?;
        let entity: WorkflowEntity = serde_json::from_value(current.clone())?;

        let transition = self.engine.apply(&entity, action, actor)?;

        let mut changes: BTreeMap<StorePath, Option<Value>> = BTreeMap::new();
        changes.insert(path.clone(), Some(serde_json::to_value(&transition.entity)?));
        self.stage_side_effects(&transition.events, &mut changes)
            .await?;

        self.store.update_guarded(path, Some(&current), changes).await?;
        self.outbox.enqueue_all(&transition.events).await?;

        tracing::info!(
            entity_id = %transition.entity.id(),
            action = %action.kind,
            status = %transition.entity.status_label(),
            "transition committed"
        );
        Ok(transition.entity)
    }

    /// Merging write (comment, viewed flag, rejection acknowledgement):
    /// bounded compare-and-swap retry so racing appends all land.
    async fn execute_merge(
        &self,
        path: &StorePath,
        action: &Action,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let mut attempts = 0;
        loop {
            let current = self
                .store
                .read(path)
                .await?
                .ok_or_else(|| ServiceError::NotFound(path.clone()))?;
            let entity: WorkflowEntity = serde_json::from_value(current.clone())?;

            let (next, events, changed) = match action.kind {
                ActionKind::Comment => {
                    let transition = self.engine.apply(&entity, action, actor)?;
                    (transition.entity, transition.events, true)
                }
                ActionKind::MarkViewed => {
                    let (next, changed) = self.engine.mark_viewed(&entity, actor)?;
                    (next, Vec::new(), changed)
                }
                ActionKind::AcknowledgeRejection => {
                    let (next, changed) = self.engine.acknowledge_rejection(&entity, actor)?;
                    (next, Vec::new(), changed)
                }
                _ => unreachable!("execute_merge only handles merging actions"),
            };

            if !changed {
                // idempotent no-op: nothing written, nothing emitted
                return Ok(entity);
            }

            let value = serde_json::to_value(&next)?;
            match self.store.compare_and_swap(path, Some(&current), value).await {
                Ok(()) => {
                    self.outbox.enqueue_all(&events).await?;
                    return Ok(next);
                }
                Err(StoreError::Conflict(_)) => {
                    attempts += 1;
                    if attempts >= self.config.merge_retry_limit {
                        return Err(ServiceError::ConcurrentConflict);
                    }
                    // re-read and re-apply on top of the winner
                }
            }
        }
    }

    /// Fold the engine's side effects into the same atomic commit
    async fn stage_side_effects(
        &self,
        events: &[EngineEvent],
        changes: &mut BTreeMap<StorePath, Option<Value>>,
    ) -> ServiceResult<()> {
        for event in events {
            match event {
                EngineEvent::StockDecremented {
                    item_code,
                    quantity,
                } => {
                    let path = stock_path(item_code);
                    // honor a decrement already staged in this commit
                    let current = match changes.get(&path) {
                        Some(Some(staged)) => staged.as_u64().unwrap_or(0),
                        _ => self
                            .store
                            .read(&path)
                            .await?
                            .and_then(|value| value.as_u64())
                            .unwrap_or(0),
                    };
                    let remaining = current.saturating_sub(u64::from(*quantity));
                    changes.insert(path, Some(Value::from(remaining)));
                }
                EngineEvent::HistoryAppended { employee, record } => {
                    let path = history_path(employee).child(push_key(Utc::now()));
                    changes.insert(path, Some(serde_json::to_value(record)?));
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ── Admin operations ─────────────────────────────────────────────

    /// Reopen a terminal entity as a fresh linked entity at its own
    /// path; the original is left untouched
    pub async fn reopen(&self, path: &StorePath, actor: &Actor) -> ServiceResult<WorkflowEntity> {
        let entity = self.load(path).await?;
        let transition = self.engine.reopen(&entity, actor)?;

        let successor_path = entity_path(&transition.entity);
        let value = serde_json::to_value(&transition.entity)?;
        self.store.write(&successor_path, value).await?;
        self.outbox.enqueue_all(&transition.events).await?;
        Ok(transition.entity)
    }

    /// Admin-only purge: deletes the entity subtree, comments and
    /// attachment references included
    pub async fn purge(&self, path: &StorePath, actor: &Actor) -> ServiceResult<()> {
        let entity = self.load(path).await?;
        self.engine.authorize_purge(&entity, actor)?;
        self.store.remove(path).await?;
        tracing::info!(entity_id = %entity.id(), actor = %actor.id, "entity purged");
        Ok(())
    }

    // ── Per-action entry points (the presentation boundary) ──────────

    pub async fn approve(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: Option<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let mut action = Action::new(ActionKind::Approve, actor.id.clone());
        if let Some(text) = comment {
            action = action.with_comment(text);
        }
        self.execute(path, &action, actor).await
    }

    pub async fn reject(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Reject, actor.id.clone()).with_comment(comment);
        self.execute(path, &action, actor).await
    }

    pub async fn issue(&self, path: &StorePath, actor: &Actor) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Issue, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn dispute(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Dispute, actor.id.clone()).with_comment(comment);
        self.execute(path, &action, actor).await
    }

    pub async fn resolve(
        &self,
        path: &StorePath,
        actor: &Actor,
        disposition: ResolveDisposition,
        comment: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Resolve, actor.id.clone())
            .with_comment(comment)
            .with_payload(ActionPayload::Resolution(disposition));
        self.execute(path, &action, actor).await
    }

    pub async fn comment(
        &self,
        path: &StorePath,
        actor: &Actor,
        text: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Comment, actor.id.clone()).with_comment(text);
        self.execute(path, &action, actor).await
    }

    pub async fn mark_viewed(
        &self,
        path: &StorePath,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::MarkViewed, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn acknowledge_rejection(
        &self,
        path: &StorePath,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::AcknowledgeRejection, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn submit_task(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: Option<String>,
        attachment: Option<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let mut action = Action::new(ActionKind::Submit, actor.id.clone());
        if let Some(text) = comment {
            action = action.with_comment(text);
        }
        if let Some(url) = attachment {
            action = action.with_payload(ActionPayload::Attachment(url));
        }
        self.execute(path, &action, actor).await
    }

    pub async fn return_task(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Return, actor.id.clone()).with_comment(comment);
        self.execute(path, &action, actor).await
    }

    pub async fn update_subtask(
        &self,
        path: &StorePath,
        actor: &Actor,
        status: SubtaskStatus,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::UpdateSubtask, actor.id.clone())
            .with_payload(ActionPayload::Subtask { status });
        self.execute(path, &action, actor).await
    }

    pub async fn acknowledge(
        &self,
        path: &StorePath,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Acknowledge, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn send_to_office(
        &self,
        path: &StorePath,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::SendToOffice, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn office_acknowledge(
        &self,
        path: &StorePath,
        actor: &Actor,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::OfficeAcknowledge, actor.id.clone());
        self.execute(path, &action, actor).await
    }

    pub async fn reply(
        &self,
        path: &StorePath,
        actor: &Actor,
        comment: impl Into<String>,
    ) -> ServiceResult<WorkflowEntity> {
        let action = Action::new(ActionKind::Reply, actor.id.clone()).with_comment(comment);
        self.execute(path, &action, actor).await
    }
}
