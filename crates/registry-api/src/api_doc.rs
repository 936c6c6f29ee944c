//! OpenAPI documentation, served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use registry_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Preservation Registry API",
        version = "0.1.0",
        description = "Deletion approval, restoration and work item requeue for the preservation registry."
    ),
    paths(
        handlers::health::liveness_check,
        handlers::generic_files::request_file_deletion,
        handlers::generic_files::request_file_restoration,
        handlers::intellectual_objects::request_object_deletion,
        handlers::intellectual_objects::request_object_restoration,
        handlers::deletions::review,
        handlers::deletions::approve,
        handlers::deletions::cancel,
        handlers::deletions::show,
        handlers::work_items::show,
        handlers::work_items::requeue_options,
        handlers::work_items::requeue,
        handlers::admin::batch_delete,
        handlers::admin::prepare_file_delete,
        handlers::admin::prepare_object_delete,
    ),
    components(schemas(
        ErrorResponse,
        models::DeletionRequest,
        models::DeletionRequestStatus,
        models::WorkItem,
        models::Action,
        models::Stage,
        models::WorkItemStatus,
        handlers::deletions::TokenForm,
        handlers::deletions::DeletionDetailsResponse,
        handlers::work_items::RequeueForm,
        handlers::work_items::RequeueOptionsResponse,
        handlers::admin::BatchDeletionBody,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "generic_files", description = "File deletion and restoration requests"),
        (name = "intellectual_objects", description = "Object deletion and restoration requests"),
        (name = "deletions", description = "Review, approval and cancellation of deletion requests"),
        (name = "work_items", description = "Work item view and operator requeue"),
        (name = "admin", description = "System administrator operations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_workflow_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/deletions/approve/{id}",
            "/work_items/requeue/{id}",
            "/admin/deletions/batch",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
