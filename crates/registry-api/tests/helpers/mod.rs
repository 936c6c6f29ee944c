//! Shared setup for the HTTP tests: the real router over in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use registry_api::auth::issue_token;
use registry_api::setup::routes::setup_routes;
use registry_api::AppState;
use registry_core::models::{AlertType, IntellectualObject, Role, User};
use registry_db::test_helpers::{object, user};
use registry_services::test_helpers::TestHarness;

pub struct TestApp {
    pub server: TestServer,
    pub harness: TestHarness,
}

impl TestApp {
    /// Bearer header value for `user`.
    pub fn bearer(&self, user: &User) -> String {
        let token = issue_token(self.harness.ctx.config.jwt_secret(), user.id, 1)
            .expect("Failed to sign test token");
        format!("Bearer {}", token)
    }

    /// Plaintext token from the review link in the latest request alert.
    pub fn review_token(&self) -> String {
        let alert = self
            .harness
            .store
            .alerts()
            .into_iter()
            .rev()
            .find(|a| a.alert_type == AlertType::DeletionRequested)
            .expect("No deletion request alert");
        let start = alert
            .content
            .find("token=")
            .expect("Review link missing from alert")
            + "token=".len();
        alert.content[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    }
}

pub fn setup_test_app() -> TestApp {
    let harness = TestHarness::new();
    let state = Arc::new(AppState::new(harness.ctx.clone()));
    let app = setup_routes(&harness.ctx.config, state).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");
    TestApp { server, harness }
}

/// Object 10 of institution 1 with its institutional admin (user 101).
pub fn seeded_object(app: &TestApp) -> (IntellectualObject, User) {
    let obj = object(10, 1);
    let admin = app.harness.seed_object(&obj);
    (obj, admin)
}

pub fn sys_admin(app: &TestApp) -> User {
    let admin = user(1, 99, Role::SysAdmin);
    app.harness.store.add_user(admin.clone());
    admin
}
