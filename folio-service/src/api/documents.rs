//! Document API endpoints.
//!
//! Handlers for upload, listing, download, pictures and deletion.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{Document, Picture};
use crate::error::ServiceError;
use crate::ingestion::assets::sanitize_filename;
use crate::service::DocumentUpload;

use super::{AccountId, AppState, DeleteResponse, upload_body_limit};

/// Response for a completed upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: usize,
}

fn multipart_error(state: &AppState, error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::FileTooLarge {
            size: upload_body_limit(&state.service) as u64,
            max: state.service.max_document_size(),
        }
    } else {
        ServiceError::InvalidInput {
            message: error.body_text(),
        }
    }
}

/// Upload a document (multipart fields `file`, `name`, `year`)
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ServiceError> {
    let mut file_data: Option<(Vec<u8>, String)> = None;
    let mut name = String::new();
    let mut year = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(&state, e))?;
                file_data = Some((data.to_vec(), filename));
            }
            "name" => {
                name = field.text().await.map_err(|e| multipart_error(&state, e))?;
            }
            "year" => {
                year = field.text().await.map_err(|e| multipart_error(&state, e))?;
            }
            _ => {}
        }
    }

    let (content, filename) = file_data.ok_or_else(|| ServiceError::InvalidInput {
        message: "No file provided".to_string(),
    })?;

    let id = state
        .service
        .ingest(
            &account_id,
            DocumentUpload {
                name,
                year,
                filename,
                content,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id,
            message: "Document uploaded".to_string(),
        }),
    ))
}

/// List the account's documents
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
) -> Result<Json<Vec<Document>>, ServiceError> {
    Ok(Json(state.service.list_documents(&account_id)?))
}

pub async fn count_documents_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
) -> Result<Json<CountResponse>, ServiceError> {
    let count = state.service.count_documents(&account_id)?;
    Ok(Json(CountResponse { count }))
}

/// Download the original file
pub async fn document_file_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let file = state.service.document_file(&account_id, &id)?;

    let filename = match sanitize_filename(&file.filename) {
        name if name.is_empty() => "document.pdf".to_string(),
        name => name,
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mime_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        file.data,
    )
        .into_response())
}

pub async fn document_pictures_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Path(id): Path<String>,
) -> Result<Json<Vec<Picture>>, ServiceError> {
    Ok(Json(state.service.document_pictures(&account_id, &id)?))
}

/// Delete a document with its pictures and files
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    AccountId(account_id): AccountId,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ServiceError> {
    state.service.delete_document(&account_id, &id)?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Document deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::test_support::*;
    use crate::ingestion::pdf::fixtures::{TestImage, build_pdf};
    use crate::service::testing::{Harness, ScriptedDescriber};
    use axum::http::StatusCode;

    fn harness() -> Harness {
        Harness::new(ScriptedDescriber::new([(&b"owl"[..], "an owl on a branch")]))
    }

    fn sample_pdf() -> Vec<u8> {
        build_pdf(vec![vec![TestImage::Jpeg(b"owl".to_vec())]])
    }

    #[tokio::test]
    async fn test_upload_list_download_delete() {
        let harness = harness();
        let app = router(harness.service.clone());
        let pdf = sample_pdf();

        let response = send(
            &app,
            upload(
                "alice",
                &[("name", "Birds"), ("year", "1975")],
                Some(("birds.pdf", &pdf)),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let listed = body_json(send(&app, get("/api/documents", "alice")).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["name"], "Birds");
        assert_eq!(listed[0]["year"], 1975);
        assert_eq!(listed[0]["status"], "ready");

        let count = body_json(send(&app, get("/api/documents/count", "alice")).await).await;
        assert_eq!(count["count"], 1);

        let file = send(&app, get(&format!("/api/documents/{id}/file"), "alice")).await;
        assert_eq!(file.status(), StatusCode::OK);
        assert_eq!(file.headers()["content-type"], "application/pdf");
        assert_eq!(
            file.headers()["content-disposition"],
            "attachment; filename=\"birds.pdf\""
        );
        assert_eq!(body_bytes(file).await, pdf);

        let pictures =
            body_json(send(&app, get(&format!("/api/documents/{id}/pictures"), "alice")).await)
                .await;
        assert_eq!(pictures[0]["description"], "an owl on a branch");

        let deleted = send(&app, delete(&format!("/api/documents/{id}"), "alice")).await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let again = send(&app, delete(&format!("/api/documents/{id}"), "alice")).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(again).await["code"], "not_found");
    }

    #[tokio::test]
    async fn test_other_accounts_cannot_see_documents() {
        let harness = harness();
        let app = router(harness.service.clone());
        let pdf = sample_pdf();

        let response = send(
            &app,
            upload("alice", &[("name", "Birds"), ("year", "1975")], Some(("b.pdf", &pdf))),
        )
        .await;
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let listed = body_json(send(&app, get("/api/documents", "bob")).await).await;
        assert!(listed.as_array().unwrap().is_empty());

        let file = send(&app, get(&format!("/api/documents/{id}/file"), "bob")).await;
        assert_eq!(file.status(), StatusCode::NOT_FOUND);

        let deleted = send(&app, delete(&format!("/api/documents/{id}"), "bob")).await;
        assert_eq!(deleted.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_validation_statuses() {
        let harness = harness();
        let app = router(harness.service.clone());
        let pdf = sample_pdf();

        let no_file = send(&app, upload("alice", &[("name", "A"), ("year", "1")], None)).await;
        assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

        let bad_year = send(
            &app,
            upload("alice", &[("name", "A"), ("year", "soon")], Some(("a.pdf", &pdf))),
        )
        .await;
        assert_eq!(bad_year.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(bad_year).await["code"], "invalid_input");

        let not_pdf = send(
            &app,
            upload(
                "alice",
                &[("name", "A"), ("year", "1")],
                Some(("a.pdf", b"PK\x03\x04 zip archive")),
            ),
        )
        .await;
        assert_eq!(not_pdf.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(not_pdf).await["code"], "malformed_document");
    }
}
