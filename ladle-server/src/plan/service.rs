//! Plan service - access control, orchestration and event publication
//!
//! The service sits between the API edge and the ordering engine:
//! it resolves the actor's household, enforces same-household access on
//! every mutation, invokes the engine, and publishes one event per
//! committed change. The engine itself never sees users or topics.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

use shared::plan::request::{
    CreateEntryRequest, EntryView, MoveEntryRequest, PlanRange, UpdateEntryRequest,
};
use shared::{EntryKind, PlanEntry, PlanEvent, PlanEventPayload};

use super::broadcast::PlanBroadcaster;
use super::engine::{MoveOutcome, PlanEngine};
use super::error::{PlanError, PlanResult};
use crate::directory::{HouseholdDirectory, RecipeDirectory};

/// Completion handle for a fire-and-forget update
///
/// The HTTP edge drops it (the outcome arrives over the feed); tests and
/// embedded callers can await it.
#[derive(Debug)]
pub struct UpdateHandle {
    rx: oneshot::Receiver<PlanResult<PlanEntry>>,
}

impl UpdateHandle {
    /// Wait for the spawned update to finish
    pub async fn outcome(self) -> PlanResult<PlanEntry> {
        self.rx
            .await
            .map_err(|_| PlanError::Internal("update task dropped".to_string()))?
    }
}

#[derive(Clone)]
pub struct PlanService {
    engine: PlanEngine,
    households: Arc<dyn HouseholdDirectory>,
    recipes: Arc<dyn RecipeDirectory>,
    broadcaster: PlanBroadcaster,
}

impl PlanService {
    pub fn new(
        engine: PlanEngine,
        households: Arc<dyn HouseholdDirectory>,
        recipes: Arc<dyn RecipeDirectory>,
        broadcaster: PlanBroadcaster,
    ) -> Self {
        Self {
            engine,
            households,
            recipes,
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &PlanBroadcaster {
        &self.broadcaster
    }

    /// Resolve the household key of a user, if they belong to one
    pub async fn household_key_of(&self, user_id: &str) -> Option<String> {
        self.households
            .household_of(user_id)
            .await
            .map(|home| home.key)
    }

    async fn household_for_actor(&self, actor: &str) -> PlanResult<String> {
        self.households
            .household_of(actor)
            .await
            .map(|home| home.key)
            .ok_or_else(|| PlanError::Forbidden(format!("user {} belongs to no household", actor)))
    }

    /// List the household's entries in a date range, decorated with
    /// recipe metadata where available
    pub async fn list(&self, actor: &str, range: PlanRange) -> PlanResult<Vec<EntryView>> {
        let household = self.household_for_actor(actor).await?;
        let entries = self.engine.list_range(&household, range.start, range.end)?;

        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let recipe = match (entry.kind, entry.recipe_id.as_deref()) {
                (EntryKind::Recipe, Some(recipe_id)) => self.recipes.recipe_meta(recipe_id).await,
                _ => None,
            };
            views.push(EntryView { entry, recipe });
        }
        Ok(views)
    }

    /// Create an entry at the tail of its bucket and announce it
    pub async fn create(&self, actor: &str, req: CreateEntryRequest) -> PlanResult<PlanEntry> {
        let household = self.household_for_actor(actor).await?;
        let entry = self.engine.create(&household, actor, &req)?;

        tracing::info!(
            entry_id = %entry.id,
            household = %household,
            date = %entry.date,
            slot = %entry.slot,
            "plan entry created"
        );
        self.broadcaster.publish(&PlanEvent::new(
            &household,
            actor,
            PlanEventPayload::EntryCreated {
                entry: entry.clone(),
            },
        ));
        Ok(entry)
    }

    /// Delete an entry, reindex its bucket, and announce the post-state
    ///
    /// Returns `false` when the entry was already gone (benign, nothing
    /// broadcast).
    pub async fn delete(&self, actor: &str, entry_id: &str) -> PlanResult<bool> {
        let Some(existing) = self.engine.get(entry_id)? else {
            // Absent is benign, but the caller must still be someone we know
            self.household_for_actor(actor).await?;
            tracing::debug!(entry_id = %entry_id, "delete of missing entry ignored");
            return Ok(false);
        };
        let household = self
            .households
            .assert_access(actor, &existing.owner_id)
            .await?;

        let Some(outcome) = self.engine.delete(&household, entry_id)? else {
            return Ok(false);
        };

        tracing::info!(entry_id = %entry_id, household = %household, "plan entry deleted");
        self.broadcaster.publish(&PlanEvent::new(
            &household,
            actor,
            PlanEventPayload::EntryDeleted {
                entry_id: outcome.entry.id.clone(),
                date: outcome.entry.date,
                slot: outcome.entry.slot,
                positions: outcome.positions,
            },
        ));
        Ok(true)
    }

    /// Move an entry and announce the post-state of the touched buckets
    ///
    /// A positional no-op commits nothing and broadcasts nothing.
    pub async fn move_entry(
        &self,
        actor: &str,
        entry_id: &str,
        req: MoveEntryRequest,
    ) -> PlanResult<MoveOutcome> {
        let Some(existing) = self.engine.get(entry_id)? else {
            return Err(PlanError::NotFound(entry_id.to_string()));
        };
        let household = self
            .households
            .assert_access(actor, &existing.owner_id)
            .await?;

        let outcome = self.engine.move_entry(&household, entry_id, &req)?;
        if !outcome.moved {
            tracing::debug!(entry_id = %entry_id, "move was a positional no-op");
            return Ok(outcome);
        }

        tracing::info!(
            entry_id = %entry_id,
            household = %household,
            from_date = %outcome.old_date,
            from_slot = %outcome.old_slot,
            to_date = %outcome.entry.date,
            to_slot = %outcome.entry.slot,
            to_index = outcome.entry.sort_order,
            "plan entry moved"
        );
        self.broadcaster.publish(&PlanEvent::new(
            &household,
            actor,
            PlanEventPayload::EntryMoved {
                entry: outcome.entry.clone(),
                target_positions: outcome.target_positions.clone(),
                source_positions: outcome.source_positions.clone(),
                old_date: outcome.old_date,
                old_slot: outcome.old_slot,
                old_sort_order: outcome.old_sort_order,
            },
        ));
        Ok(outcome)
    }

    /// Patch a note title, fire-and-forget
    ///
    /// Access is checked synchronously so `Forbidden` reaches the caller;
    /// the write itself runs in a spawned task that reports completion
    /// over the feed as `EntryUpdated` or `UpdateFailed`. Callers that
    /// need the result can await the returned handle.
    pub async fn update(
        &self,
        actor: &str,
        entry_id: &str,
        req: UpdateEntryRequest,
    ) -> PlanResult<UpdateHandle> {
        let household = match self.engine.get(entry_id)? {
            Some(existing) => {
                self.households
                    .assert_access(actor, &existing.owner_id)
                    .await?
            }
            // Entry may already be gone; the task reports NotFound over the feed
            None => self.household_for_actor(actor).await?,
        };

        let (tx, rx) = oneshot::channel();
        let service = self.clone();
        let actor = actor.to_string();
        let entry_id = entry_id.to_string();
        tokio::spawn(async move {
            let result = service.engine.update_title(&entry_id, &req.title);
            match &result {
                Ok(entry) => {
                    tracing::info!(entry_id = %entry.id, household = %household, "plan entry updated");
                    service.broadcaster.publish(&PlanEvent::new(
                        &household,
                        &actor,
                        PlanEventPayload::EntryUpdated {
                            entry: entry.clone(),
                        },
                    ));
                }
                Err(err) => {
                    tracing::warn!(entry_id = %entry_id, error = %err, "plan entry update failed");
                    service.broadcaster.publish(&PlanEvent::new(
                        &household,
                        &actor,
                        PlanEventPayload::UpdateFailed {
                            entry_id: entry_id.clone(),
                            reason: err.to_string(),
                        },
                    ));
                }
            }
            let _ = tx.send(result);
        });
        Ok(UpdateHandle { rx })
    }

    /// Subscribe to the actor's household feed
    pub async fn subscribe(&self, actor: &str) -> PlanResult<broadcast::Receiver<PlanEvent>> {
        let household = self.household_for_actor(actor).await?;
        Ok(self.broadcaster.subscribe(&household))
    }
}
