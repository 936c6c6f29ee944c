use chrono::{Duration, Utc};
use registry_core::models::{
    Action, GenericFile, Institution, IntellectualObject, Role, Stage, State, User, WorkItem,
    WorkItemStatus,
};

pub fn institution(id: i64) -> Institution {
    Institution {
        id,
        name: format!("Institution {}", id),
        identifier: format!("inst{}.edu", id),
        state: State::Active,
    }
}

pub fn user(id: i64, institution_id: i64, role: Role) -> User {
    User {
        id,
        name: format!("User {}", id),
        email: format!("user{}@inst{}.edu", id, institution_id),
        institution_id,
        role,
        deactivated_at: None,
    }
}

pub fn object(id: i64, institution_id: i64) -> IntellectualObject {
    IntellectualObject {
        id,
        institution_id,
        identifier: format!("inst{}.edu/bag{}", institution_id, id),
        bag_name: format!("bag{}", id),
        title: format!("Bag {}", id),
        state: State::Active,
        storage_option: "Standard".to_string(),
        size: 4096,
    }
}

pub fn file(id: i64, object: &IntellectualObject) -> GenericFile {
    GenericFile {
        id,
        institution_id: object.institution_id,
        intellectual_object_id: object.id,
        identifier: format!("{}/data/file{}.txt", object.identifier, id),
        size: 512,
        state: State::Active,
        storage_option: object.storage_option.clone(),
    }
}

/// A completed ingest for `object`, the template new delete/restore items copy.
pub fn successful_ingest(object: &IntellectualObject) -> WorkItem {
    let mut item = work_item_for(object, Action::Ingest, Stage::Cleanup, WorkItemStatus::Success);
    item.note = "Finished cleanup".to_string();
    item.outcome = "Ingest complete".to_string();
    item.date_processed = Utc::now() - Duration::days(30);
    item
}

/// A work item on `object`'s bag with id 0 (assigned on insert).
pub fn work_item_for(
    object: &IntellectualObject,
    action: Action,
    stage: Stage,
    status: WorkItemStatus,
) -> WorkItem {
    let now = Utc::now();
    WorkItem {
        id: 0,
        institution_id: object.institution_id,
        intellectual_object_id: Some(object.id),
        generic_file_id: None,
        deletion_request_id: None,
        name: object.bag_name.clone(),
        etag: "0123456789abcdef0123456789abcdef".to_string(),
        bucket: format!("aptrust.receiving.inst{}.edu", object.institution_id),
        user: "depositor@example.edu".to_string(),
        object_identifier: Some(object.identifier.clone()),
        generic_file_identifier: None,
        action,
        stage,
        status,
        note: String::new(),
        outcome: String::new(),
        bag_date: now - Duration::days(31),
        date_processed: now,
        retry: false,
        node: String::new(),
        pid: 0,
        needs_admin_review: false,
        queued_at: None,
        size: object.size,
        stage_started_at: None,
        created_at: now,
        updated_at: now,
    }
}
