//! Stage ordering and queue routing
//!
//! Each action has a fixed stage sequence, and each (action, stage) pair that
//! workers consume routes to exactly one queue topic.

use crate::error::AppError;
use crate::models::{Action, Stage};

const INGEST_STAGES: [Stage; 9] = [
    Stage::Receive,
    Stage::Validate,
    Stage::ReingestCheck,
    Stage::CopyToStaging,
    Stage::FormatIdentification,
    Stage::Store,
    Stage::StorageValidation,
    Stage::Record,
    Stage::Cleanup,
];

const SINGLE_STAGE: [Stage; 1] = [Stage::Requested];

pub const TOPIC_DELETE: &str = "delete_item";
pub const TOPIC_FILE_RESTORE: &str = "restore_file";
pub const TOPIC_OBJECT_RESTORE: &str = "restore_object";
pub const TOPIC_GLACIER_RESTORE: &str = "restore_glacier";

/// Fixed stage sequence for `action`, in processing order.
pub fn canonical_stages(action: Action) -> Result<&'static [Stage], AppError> {
    match action {
        Action::Ingest => Ok(&INGEST_STAGES),
        Action::Delete | Action::RestoreFile | Action::RestoreObject | Action::GlacierRestore => {
            Ok(&SINGLE_STAGE)
        }
        Action::FixityCheck => Err(AppError::UnsupportedAction(action.to_string())),
    }
}

/// First stage a new item of this action starts at.
pub fn initial_stage(action: Action) -> Result<Stage, AppError> {
    canonical_stages(action)?
        .first()
        .copied()
        .ok_or_else(|| AppError::UnsupportedAction(action.to_string()))
}

/// Zero-based index of `stage` within the action's sequence.
pub fn stage_position(action: Action, stage: Stage) -> Result<usize, AppError> {
    canonical_stages(action)?
        .iter()
        .position(|s| *s == stage)
        .ok_or_else(|| AppError::InvalidStage {
            action: action.to_string(),
            stage: stage.to_string(),
        })
}

/// Queue topic a worker listens on for this action at this stage.
pub fn topic_for(action: Action, stage: Stage) -> Result<&'static str, AppError> {
    let topic = match (action, stage) {
        (Action::Ingest, Stage::Receive) => "ingest01_prefetch",
        (Action::Ingest, Stage::Validate) => "ingest02_bag_validation",
        (Action::Ingest, Stage::ReingestCheck) => "ingest03_reingest_check",
        (Action::Ingest, Stage::CopyToStaging) => "ingest04_staging",
        (Action::Ingest, Stage::FormatIdentification) => "ingest05_format_identification",
        (Action::Ingest, Stage::Store) => "ingest06_storage",
        (Action::Ingest, Stage::StorageValidation) => "ingest07_storage_validation",
        (Action::Ingest, Stage::Record) => "ingest08_record",
        (Action::Ingest, Stage::Cleanup) => "ingest09_cleanup",
        (Action::Delete, Stage::Requested) => TOPIC_DELETE,
        (Action::RestoreFile, Stage::Requested) => TOPIC_FILE_RESTORE,
        (Action::RestoreObject, Stage::Requested) => TOPIC_OBJECT_RESTORE,
        (Action::GlacierRestore, Stage::Requested) => TOPIC_GLACIER_RESTORE,
        _ => {
            return Err(AppError::UnsupportedCombination {
                action: action.to_string(),
                stage: stage.to_string(),
            })
        }
    };
    Ok(topic)
}
