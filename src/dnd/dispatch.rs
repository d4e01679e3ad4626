use serde::Serialize;

use super::planner::Plan;
use crate::io::store::{StoreError, TaskStore, apply_one};
use crate::model::board::{Board, Mutation};
use crate::model::config::DispatchMode;

/// Outcome of a successful dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Store calls issued
    pub applied: usize,
    /// Plan entries that would not have changed anything
    pub skipped: usize,
}

/// A dispatch that did not fully apply
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A sequential call failed. Calls before it were rolled back; any
    /// rollback call that failed is listed and leaves the store diverged.
    #[error("update of {entity} failed: {source}{}", rollback_summary(.rollback_failures))]
    Failed {
        entity: String,
        #[source]
        source: StoreError,
        /// Calls that had been applied before the failure and were undone
        rolled_back: usize,
        rollback_failures: Vec<(String, StoreError)>,
        /// Mutations the store may still hold (applied and not undone)
        stranded: Vec<Mutation>,
    },
    /// An atomic store refused the whole batch; nothing was applied
    #[error("batch update failed: {0}")]
    Batch(#[source] StoreError),
}

impl DispatchError {
    /// True when the store may now disagree with the pre-dispatch board
    pub fn diverged(&self) -> bool {
        match self {
            DispatchError::Failed {
                rollback_failures, ..
            } => !rollback_failures.is_empty(),
            DispatchError::Batch(_) => false,
        }
    }
}

fn rollback_summary(failures: &[(String, StoreError)]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        let ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
        format!(" (rollback also failed for {})", ids.join(", "))
    }
}

/// Sends planned mutations to the store
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Dispatcher { mode }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Issue one update per plan entry that changes `board`; entries that
    /// change nothing are skipped.
    ///
    /// `board` is the pre-image the plan was computed from. It is not
    /// modified; callers resync from the store afterwards.
    pub fn dispatch(
        &self,
        store: &mut dyn TaskStore,
        board: &Board,
        plan: &Plan,
    ) -> Result<DispatchReport, DispatchError> {
        let effective = plan.effective(board);
        let skipped = plan.len() - effective.len();
        if effective.is_empty() {
            tracing::debug!(skipped, "nothing to dispatch");
            return Ok(DispatchReport {
                applied: 0,
                skipped,
            });
        }

        match self.mode {
            DispatchMode::Atomic if !store.atomic_batch() => {
                // A partial batch could not be told apart from a clean
                // failure, so go one call at a time with rollback
                tracing::debug!("store batch is not atomic, dispatching sequentially");
                dispatch_sequential(store, board, &effective)?;
                Ok(DispatchReport {
                    applied: effective.len(),
                    skipped,
                })
            }
            DispatchMode::Atomic => {
                tracing::debug!(count = effective.len(), "dispatching batch");
                store.apply_batch(&effective).map_err(|e| {
                    tracing::warn!(error = %e, "batch update failed");
                    DispatchError::Batch(e)
                })?;
                Ok(DispatchReport {
                    applied: effective.len(),
                    skipped,
                })
            }
            DispatchMode::Sequential => {
                dispatch_sequential(store, board, &effective)?;
                Ok(DispatchReport {
                    applied: effective.len(),
                    skipped,
                })
            }
        }
    }
}

fn dispatch_sequential(
    store: &mut dyn TaskStore,
    board: &Board,
    mutations: &[Mutation],
) -> Result<(), DispatchError> {
    // Pre-images for rollback, captured before anything is sent
    let inverses: Vec<Option<Mutation>> = mutations.iter().map(|m| m.inverse(board)).collect();

    for (i, mutation) in mutations.iter().enumerate() {
        tracing::debug!(entity = mutation.id(), "dispatching update");
        let Err(source) = apply_one(store, mutation) else {
            continue;
        };
        tracing::warn!(entity = mutation.id(), error = %source, "update failed, rolling back");

        let mut rolled_back = 0;
        let mut rollback_failures = Vec::new();
        let mut stranded = Vec::new();
        for (done, inverse) in mutations[..i].iter().zip(&inverses[..i]).rev() {
            let result = match inverse {
                Some(inverse) => apply_one(store, inverse),
                None => Err(StoreError::TaskNotFound(done.id().to_string())),
            };
            match result {
                Ok(()) => rolled_back += 1,
                Err(e) => {
                    tracing::warn!(entity = done.id(), error = %e, "rollback failed");
                    stranded.push(done.clone());
                    rollback_failures.push((done.id().to_string(), e));
                }
            }
        }
        return Err(DispatchError::Failed {
            entity: mutation.id().to_string(),
            source,
            rolled_back,
            rollback_failures,
            stranded,
        });
    }
    Ok(())
}
