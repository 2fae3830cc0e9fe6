//! Account profile and account deletion endpoints.

use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::service::AccountProfile;

use super::{AccountId, AppState, DeleteResponse};

/// Request to update profile fields
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
}

pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
) -> Result<Json<AccountProfile>, ServiceError> {
    Ok(Json(state.service.account_profile(&account_id)?))
}

pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<AccountProfile>, ServiceError> {
    let profile = state.service.update_profile(
        &account_id,
        request.name.as_deref(),
        request.surname.as_deref(),
    )?;
    Ok(Json(profile))
}

/// Delete the account with every document and picture it owns
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
) -> Result<Json<DeleteResponse>, ServiceError> {
    state.service.delete_account(&account_id)?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Account deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::test_support::*;
    use crate::ingestion::pdf::fixtures::build_pdf;
    use crate::service::testing::{Harness, ScriptedDescriber};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn put_profile(account: &str, body: &str) -> Request<Body> {
        Request::put("/api/account")
            .header("x-account-id", account)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let harness = Harness::new(ScriptedDescriber::default());
        let id = harness
            .service
            .register_account("ada@example.com", "hash")
            .unwrap();
        let app = router(harness.service.clone());

        let profile = body_json(send(&app, get("/api/account", &id)).await).await;
        assert_eq!(profile["email"], "ada@example.com");
        assert!(profile["name"].is_null());

        let updated = send(
            &app,
            put_profile(&id, r#"{"name": "Ada", "surname": "Lovelace"}"#),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::OK);
        let updated = body_json(updated).await;
        assert_eq!(updated["surname"], "Lovelace");

        let unknown = send(&app, get("/api/account", "nobody")).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let harness = Harness::new(ScriptedDescriber::default());
        let id = harness
            .service
            .register_account("ada@example.com", "hash")
            .unwrap();
        let app = router(harness.service.clone());

        let pdf = build_pdf(vec![vec![]]);
        let uploaded = send(
            &app,
            upload(&id, &[("name", "Notes"), ("year", "1843")], Some(("n.pdf", &pdf))),
        )
        .await;
        assert_eq!(uploaded.status(), StatusCode::CREATED);

        let deleted = send(&app, delete("/api/account", &id)).await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let search = send(&app, get("/api/search", &id)).await;
        assert_eq!(search.status(), StatusCode::NOT_FOUND);

        // Nothing left to delete: the account record is gone
        let again = send(&app, delete("/api/account", &id)).await;
        assert_eq!(again.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(again).await["code"], "account_deletion_failed");
    }
}
