use axum::{
    extract::{
        multipart::MultipartError, rejection::QueryRejection, Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use bytes::Bytes;
use manafiles_core::{Category, FileRecord};
use manafiles_service::{FileService, ServiceError, UploadFile};
use serde::Deserialize;

use super::{to_error, ApiError, AppState};
use crate::auth::Caller;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/files", get(list_files).post(upload_file))
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/{id}/content", get(download_file))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
}

fn parse_category(raw: Option<&str>) -> Result<Category, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| to_error(ServiceError::MissingField("category".into())))?;
    raw.parse::<Category>()
        .map_err(|e| to_error(ServiceError::from(e)))
}

async fn list_files(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let Query(q) = query.map_err(|rej| to_error(ServiceError::InvalidInput(rej.body_text())))?;
    let category = parse_category(q.category.as_deref())?;
    state
        .service
        .list_files(caller.session(), category)
        .await
        .map(Json)
        .map_err(to_error)
}

fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    let (_, body) = to_error(ServiceError::InvalidInput(e.body_text()));
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        (status, body)
    } else {
        (StatusCode::BAD_REQUEST, body)
    }
}

/// Multipart form with `name`, `category` and `file` fields. Other fields
/// are ignored.
async fn upload_file(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let session = caller.require()?;

    let mut name = String::new();
    let mut category = None;
    let mut file: (String, Option<String>, Bytes) = Default::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => name = field.text().await.map_err(multipart_error)?,
            Some("category") => category = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                file = (filename, content_type, data);
            }
            _ => {}
        }
    }

    let category = parse_category(category.as_deref())?;
    let (filename, content_type, data) = file;
    let record = state
        .service
        .upload_file(
            session,
            UploadFile {
                name,
                category,
                filename,
                content_type,
                data,
            },
        )
        .await
        .map_err(to_error)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_file(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, ApiError> {
    let session = caller.require()?;
    state
        .service
        .get_file(session, &id)
        .await
        .map(Json)
        .map_err(to_error)
}

async fn download_file(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = caller.require()?;
    let (record, data) = state
        .service
        .download_file(session, &id)
        .await
        .map_err(to_error)?;
    let headers = [
        (header::CONTENT_TYPE, record.content_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&record.download_name()),
        ),
    ];
    Ok((headers, data).into_response())
}

async fn delete_file(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = caller.require()?;
    state
        .service
        .delete_file(session, &id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

/// `attachment` disposition with a quoted, ASCII-only file name.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::test_helpers::{test_router, test_state, CapturedCodes, TEST_MAX_UPLOAD_BYTES};
    use manafiles_core::user::{Login, Signup};

    const BOUNDARY: &str = "X-BOUNDARY";

    fn multipart_body(category: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\n{category}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn logged_in_router() -> (Router, String, tempfile::TempDir) {
        let (state, tmp) = test_state(std::sync::Arc::new(CapturedCodes::default()));
        state
            .service
            .signup(&Signup {
                username: "alice".into(),
                email: None,
                password: "pw".into(),
            })
            .await
            .unwrap();
        let session = state
            .service
            .login(&Login {
                username: "alice".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        (crate::build_router(state), session.token, tmp)
    }

    fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::post("/api/files")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn disposition_escapes_quotes_and_non_ascii() {
        assert_eq!(
            content_disposition("report \"final\".pdf"),
            "attachment; filename=\"report _final_.pdf\""
        );
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\""
        );
    }

    #[test]
    fn category_query_validation() {
        assert_eq!(parse_category(Some("notes")).unwrap(), Category::Notes);
        let (status, _) = parse_category(Some("videos")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = parse_category(None).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0, json!({ "error": "missing field: category" }));
    }

    #[tokio::test]
    async fn anonymous_list_is_empty_array() {
        let (app, _tmp) = test_router();
        let resp = app
            .oneshot(
                Request::get("/api/files?category=images")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn anonymous_upload_is_unauthorized() {
        let (app, _tmp) = test_router();
        let resp = app
            .oneshot(
                Request::post("/api/files")
                    .header(
                        header::CONTENT_TYPE,
                        "multipart/form-data; boundary=X-BOUNDARY",
                    )
                    .body(Body::from("--X-BOUNDARY--\r\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bogus_token_is_unauthorized() {
        let (app, _tmp) = test_router();
        let resp = app
            .oneshot(
                Request::get("/api/files?category=notes")
                    .header(header::AUTHORIZATION, "Bearer mf_not-a-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_then_download_sets_headers() {
        let (app, token, _tmp) = logged_in_router().await;

        let resp = app
            .clone()
            .oneshot(upload_request(&token, multipart_body("notes", "todo.txt", b"milk")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let record: FileRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(record.name, "todo");
        assert_eq!(record.category, Category::Notes);

        let resp = app
            .oneshot(
                Request::get(format!("/api/files/{}/content", record.id))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"todo.txt\""
        );
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"milk");
    }

    #[tokio::test]
    async fn unknown_category_is_bad_request() {
        let (app, token, _tmp) = logged_in_router().await;
        let resp = app
            .oneshot(upload_request(&token, multipart_body("videos", "a.mp4", b"x")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (app, token, _tmp) = logged_in_router().await;
        let data = vec![b'a'; TEST_MAX_UPLOAD_BYTES + 1];
        let resp = app
            .oneshot(upload_request(&token, multipart_body("notes", "big.txt", &data)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
