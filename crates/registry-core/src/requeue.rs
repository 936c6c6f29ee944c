//! Requeue planner
//!
//! Computes where an operator may send a stuck work item back to, and resets
//! its execution state. Persisting and re-enqueueing are left to the caller.

use crate::error::AppError;
use crate::models::{Stage, WorkItem, WorkItemStatus};
use crate::stages::{canonical_stages, stage_position};

/// Stages an operator may requeue `item` to: every stage up to and including
/// the current one. Single-stage actions only offer their initial stage.
pub fn legal_requeue_targets(item: &WorkItem) -> Result<Vec<Stage>, AppError> {
    let stages = canonical_stages(item.action)?;
    if stages.len() == 1 {
        return Ok(stages.to_vec());
    }
    let current = stage_position(item.action, item.stage)?;
    Ok(stages[..=current].to_vec())
}

/// Requeue options for an operator form. Completed items cannot be re-driven.
pub fn requeue_options(item: &WorkItem) -> Result<Vec<Stage>, AppError> {
    if item.has_completed() {
        return Err(AppError::NotSupported(format!(
            "Work item {} has completed and cannot be requeued",
            item.id
        )));
    }
    legal_requeue_targets(item)
}

/// Resets `item` so a worker picks it up again at `target`.
pub fn set_for_requeue(item: &mut WorkItem, target: Stage) -> Result<(), AppError> {
    if !legal_requeue_targets(item)?.contains(&target) {
        return Err(AppError::InvalidStage {
            action: item.action.to_string(),
            stage: target.to_string(),
        });
    }
    item.stage = target;
    item.status = WorkItemStatus::Pending;
    item.retry = true;
    item.needs_admin_review = false;
    item.node.clear();
    item.pid = 0;
    item.queued_at = None;
    item.note = format!("Requeued for {}", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::work_item;
    use crate::models::Action;

    #[test]
    fn test_targets_at_store_are_first_six() {
        let item = work_item(Action::Ingest, Stage::Store, WorkItemStatus::Failed);
        let targets = legal_requeue_targets(&item).unwrap();
        assert_eq!(
            targets,
            vec![
                Stage::Receive,
                Stage::Validate,
                Stage::ReingestCheck,
                Stage::CopyToStaging,
                Stage::FormatIdentification,
                Stage::Store,
            ]
        );
    }

    #[test]
    fn test_targets_at_receive_is_only_receive() {
        let item = work_item(Action::Ingest, Stage::Receive, WorkItemStatus::Pending);
        assert_eq!(legal_requeue_targets(&item).unwrap(), vec![Stage::Receive]);
    }

    #[test]
    fn test_single_stage_action_targets() {
        let item = work_item(Action::Delete, Stage::Requested, WorkItemStatus::Failed);
        assert_eq!(legal_requeue_targets(&item).unwrap(), vec![Stage::Requested]);

        // Worker-written stage still offers the initial stage.
        let item = work_item(Action::RestoreObject, Stage::Restoring, WorkItemStatus::Started);
        assert_eq!(legal_requeue_targets(&item).unwrap(), vec![Stage::Requested]);
    }

    #[test]
    fn test_requeue_to_future_stage_fails() {
        let mut item = work_item(Action::Ingest, Stage::Store, WorkItemStatus::Failed);
        let before = item.clone();
        let err = set_for_requeue(&mut item, Stage::Cleanup).unwrap_err();
        assert!(matches!(err, AppError::InvalidStage { .. }));
        assert_eq!(item.stage, before.stage);
        assert_eq!(item.status, before.status);
    }

    #[test]
    fn test_set_for_requeue_resets_execution_state() {
        let mut item = work_item(Action::Ingest, Stage::Record, WorkItemStatus::Started);
        item.retry = false;
        item.needs_admin_review = true;
        item.node = "worker-3".to_string();
        item.pid = 4411;
        item.queued_at = Some(chrono::Utc::now());

        set_for_requeue(&mut item, Stage::Validate).unwrap();

        assert_eq!(item.stage, Stage::Validate);
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert!(item.retry);
        assert!(!item.needs_admin_review);
        assert_eq!(item.node, "");
        assert_eq!(item.pid, 0);
        assert!(item.queued_at.is_none());
        assert_eq!(item.note, "Requeued for Validate");
    }

    #[test]
    fn test_requeue_options_refuses_completed_item() {
        let item = work_item(Action::Ingest, Stage::Cleanup, WorkItemStatus::Success);
        assert!(matches!(
            requeue_options(&item),
            Err(AppError::NotSupported(_))
        ));

        let item = work_item(Action::Ingest, Stage::Validate, WorkItemStatus::Pending);
        assert_eq!(requeue_options(&item).unwrap().len(), 2);
    }

    #[test]
    fn test_fixity_items_have_no_targets() {
        let item = work_item(Action::FixityCheck, Stage::Requested, WorkItemStatus::Failed);
        assert!(matches!(
            legal_requeue_targets(&item),
            Err(AppError::UnsupportedAction(_))
        ));
    }
}
