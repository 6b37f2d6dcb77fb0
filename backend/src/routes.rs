use crate::error::ApiError;
use crate::handler::{ClassifyHandler, Stage};
use crate::upload::UploadPart;
use actix_multipart::{Field, Multipart};
use actix_web::http::header::CONTENT_LENGTH;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::StreamExt;
use log::{info, warn};
use shared::constants::{CLASSIFY_ENDPOINT, HEALTH_ENDPOINT, IMAGE_FIELD};
use shared::{Endpoints, HealthResponse, StatusResponse};
use uuid::Uuid;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(status)))
        .service(web::resource(HEALTH_ENDPOINT).route(web::get().to(health)))
        .service(web::resource(CLASSIFY_ENDPOINT).route(web::post().to(classify)));
}

async fn status(handler: web::Data<ClassifyHandler>) -> HttpResponse {
    let info = handler.normalizer().model_info();
    HttpResponse::Ok().json(StatusResponse {
        status: "healthy".into(),
        message: "Forest Fire Classifier API is running".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        model: format!("{} {} ({})", info.framework, info.architecture, info.weights),
    })
}

async fn health(handler: web::Data<ClassifyHandler>) -> HttpResponse {
    let info = handler.normalizer().model_info();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".into(),
        endpoints: Endpoints {
            classify: CLASSIFY_ENDPOINT.into(),
            health: HEALTH_ENDPOINT.into(),
        },
        model_status: format!("{} {} loaded and ready", info.framework, info.architecture),
    })
}

async fn classify(
    req: HttpRequest,
    handler: web::Data<ClassifyHandler>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let max_bytes = handler.max_upload_bytes();
    info!("[{}] {}: POST {}", request_id, Stage::Received, CLASSIFY_ENDPOINT);

    if let Some(length) = declared_length(&req) {
        if length > max_bytes {
            warn!("[{}] Declared body of {} bytes exceeds {}", request_id, length, max_bytes);
            return Err(ApiError::TooLarge { max_bytes });
        }
    }

    let part = read_image_part(payload, max_bytes).await.inspect_err(|e| {
        if let ApiError::TooLarge { .. } = e {
            warn!("[{}] Streamed body exceeds {} bytes", request_id, max_bytes);
        }
    })?;
    let image = handler.validate(request_id, part)?;

    let worker = handler.clone();
    let response = web::block(move || worker.classify(request_id, image)).await??;

    info!("[{}] {}: {}", request_id, Stage::Responded, response.classification);
    Ok(HttpResponse::Ok().json(response))
}

fn declared_length(req: &HttpRequest) -> Option<usize> {
    req.headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Reads the multipart body, keeping the first `image` file part. Every byte read counts
/// against `max_bytes`; crossing it aborts before anything reaches disk. A body that is
/// not multipart at all is treated as having no image; one that breaks off after its
/// first field is rejected as a whole.
async fn read_image_part(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<UploadPart>, ApiError> {
    let mut total = 0usize;
    let mut image: Option<UploadPart> = None;
    let mut fields_read = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) if fields_read == 0 => {
                warn!("Body is not multipart: {}", e);
                return Ok(None);
            }
            Err(e) => {
                warn!("Malformed multipart body after {} fields: {}", fields_read, e);
                return Err(ApiError::MissingFile);
            }
        };
        fields_read += 1;

        let wanted = image.is_none() && field.name() == Some(IMAGE_FIELD);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let data = read_field(&mut field, &mut total, max_bytes, wanted).await?;
        if wanted {
            image = Some(UploadPart { filename, data });
        }
    }

    Ok(image)
}

async fn read_field(
    field: &mut Field,
    total: &mut usize,
    max_bytes: usize,
    keep: bool,
) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Failed to read multipart field: {}", e);
            ApiError::MissingFile
        })?;
        *total += chunk.len();
        if *total > max_bytes {
            return Err(ApiError::TooLarge { max_bytes });
        }
        if keep {
            data.extend_from_slice(&chunk);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::handler::tests::{FakeClassifier, handler_with};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use shared::{ClassifyResponse, ErrorResponse, FireClass, constants::messages};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    const BOUNDARY: &str = "----firetestboundary";

    enum Part<'a> {
        File {
            name: &'a str,
            filename: &'a str,
            data: &'a [u8],
        },
        Text {
            name: &'a str,
            value: &'a str,
        },
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File {
                    name,
                    filename,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn classify_request(parts: &[Part]) -> test::TestRequest {
        test::TestRequest::post()
            .uri(CLASSIFY_ENDPOINT)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(parts))
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    async fn call(
        dir: &Path,
        max_bytes: usize,
        classifier: Arc<dyn Classifier>,
        req: test::TestRequest,
    ) -> (StatusCode, web::Bytes) {
        let handler = web::Data::new(handler_with(dir, max_bytes, classifier));
        let app = test::init_service(App::new().app_data(handler).configure(configure_routes)).await;
        let resp = test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        (status, test::read_body(resp).await)
    }

    fn fire_classifier() -> Arc<FakeClassifier> {
        Arc::new(FakeClassifier::returning("fire", [0.9, 0.1]))
    }

    #[actix_web::test]
    async fn classify_returns_normalized_payload() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let req = classify_request(&[Part::File {
            name: "image",
            filename: "forest.jpg",
            data: b"jpeg bytes",
        }]);

        let (status, body) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::OK);

        let body: ClassifyResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.classification, FireClass::Fire);
        assert_eq!(body.confidence, 0.9);
        assert_eq!(body.probabilities.fire, 0.9);
        assert_eq!(body.probabilities.no_fire, 0.1);
        assert_eq!(body.raw_prediction, "fire");
        assert_eq!(body.message, "Image classified as: fire");
        assert_eq!(body.model_info.framework, "PyTorch");
        assert!((body.probabilities.fire + body.probabilities.no_fire - 1.0).abs() <= 0.001);
        assert_eq!(
            body.confidence,
            body.probabilities.fire.max(body.probabilities.no_fire)
        );

        let seen = fake.seen.lock().unwrap();
        assert!(seen[0].1);
        assert!(!seen[0].0.exists());
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn response_uses_wire_field_names() {
        let tmp = TempDir::new().unwrap();
        let req = classify_request(&[Part::File {
            name: "image",
            filename: "forest.png",
            data: b"png bytes",
        }]);
        let classifier = Arc::new(FakeClassifier::returning("no fire", [0.2, 0.8]));

        let (status, body) = call(tmp.path(), 1024, classifier, req).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["classification"], "no fire");
        assert_eq!(json["confidence"], 0.8);
        assert_eq!(json["probabilities"]["no_fire"], 0.8);
        assert_eq!(json["model_info"]["architecture"], "Inception V3");
    }

    #[actix_web::test]
    async fn missing_image_field_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let req = classify_request(&[
            Part::Text {
                name: "comment",
                value: "hello",
            },
            Part::File {
                name: "photo",
                filename: "forest.png",
                data: b"png",
            },
        ]);

        let (status, body) = call(tmp.path(), 1024, fire_classifier(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, messages::MISSING_FILE);
        assert_eq!(body.code, "missing_file");
    }

    #[actix_web::test]
    async fn non_multipart_body_is_missing_file() {
        let tmp = TempDir::new().unwrap();
        let req = test::TestRequest::post()
            .uri(CLASSIFY_ENDPOINT)
            .insert_header(("content-type", "application/json"))
            .set_payload("{}");

        let (status, body) = call(tmp.path(), 1024, fire_classifier(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, "missing_file");
    }

    #[actix_web::test]
    async fn empty_filename_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let req = classify_request(&[Part::File {
            name: "image",
            filename: "",
            data: b"",
        }]);

        let (status, body) = call(tmp.path(), 1024, fire_classifier(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, messages::EMPTY_FILENAME);
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn disallowed_extension_is_bad_request_without_scratch_file() {
        for filename in ["payload.exe", "notes.TXT", "noextension"] {
            let tmp = TempDir::new().unwrap();
            let fake = fire_classifier();
            let req = classify_request(&[Part::File {
                name: "image",
                filename,
                data: b"data",
            }]);

            let (status, body) = call(tmp.path(), 1024, fake.clone(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{filename}");
            let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(body.error, messages::UNSUPPORTED_TYPE);
            assert!(is_empty(tmp.path()));
            assert!(fake.seen.lock().unwrap().is_empty());
        }
    }

    #[actix_web::test]
    async fn oversized_body_is_rejected_before_storage() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let data = vec![7u8; 4096];
        let req = classify_request(&[Part::File {
            name: "image",
            filename: "huge.png",
            data: &data,
        }]);

        let (status, body) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, "payload_too_large");
        assert!(is_empty(tmp.path()));
        assert!(fake.seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn oversized_stream_without_length_is_rejected() {
        let data = vec![7u8; 4096];
        let body = multipart_body(&[Part::File {
            name: "image",
            filename: "huge.png",
            data: &data,
        }]);
        let (req, payload) = test::TestRequest::post()
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
            .to_http_parts();
        let multipart = Multipart::new(req.headers(), payload);

        let err = read_image_part(multipart, 1024).await.unwrap_err();
        assert_eq!(err, ApiError::TooLarge { max_bytes: 1024 });
    }

    #[actix_web::test]
    async fn unterminated_body_is_rejected_without_classifying() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let mut body = multipart_body(&[Part::File {
            name: "image",
            filename: "f.png",
            data: b"partial image bytes",
        }]);
        let closing = format!("--{}--\r\n", BOUNDARY);
        body.truncate(body.len() - closing.len());
        let req = test::TestRequest::post()
            .uri(CLASSIFY_ENDPOINT)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body);

        let (status, body) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, "missing_file");
        assert!(fake.seen.lock().unwrap().is_empty());
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn truncated_image_data_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"f.png\"\r\n\r\n",
            BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(b"half an image");
        let req = test::TestRequest::post()
            .uri(CLASSIFY_ENDPOINT)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body);

        let (status, _) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(fake.seen.lock().unwrap().is_empty());
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn long_filename_is_classified() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let filename = format!("{}.png", "a".repeat(240));
        let req = classify_request(&[Part::File {
            name: "image",
            filename: &filename,
            data: b"png bytes",
        }]);

        let (status, _) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1);
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn classifier_failure_is_internal_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeClassifier::failing("truncated jpeg at /tmp/x"));
        let req = classify_request(&[Part::File {
            name: "image",
            filename: "forest.jpg",
            data: b"broken",
        }]);

        let (status, body) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, messages::CLASSIFICATION_FAILED);
        assert!(!body.error.contains("/tmp/x"));

        let seen = fake.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].0.exists());
        assert!(is_empty(tmp.path()));
    }

    #[actix_web::test]
    async fn first_image_part_wins() {
        let tmp = TempDir::new().unwrap();
        let fake = fire_classifier();
        let req = classify_request(&[
            Part::File {
                name: "image",
                filename: "first.png",
                data: b"one",
            },
            Part::File {
                name: "image",
                filename: "second.exe",
                data: b"two",
            },
        ]);

        let (status, _) = call(tmp.path(), 1024, fake.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        let seen = fake.seen.lock().unwrap();
        assert!(seen[0].0.to_str().unwrap().ends_with("-first.png"));
    }

    #[actix_web::test]
    async fn health_endpoints_report_status() {
        let tmp = TempDir::new().unwrap();
        let handler = web::Data::new(handler_with(tmp.path(), 1024, fire_classifier()));
        let app = test::init_service(App::new().app_data(handler).configure(configure_routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(HEALTH_ENDPOINT).to_request(),
        )
        .await;
        let body: HealthResponse = test::read_body_json(resp).await;
        assert_eq!(body.endpoints.classify, CLASSIFY_ENDPOINT);
        assert_eq!(body.endpoints.health, HEALTH_ENDPOINT);
        assert_eq!(body.model_status, "PyTorch Inception V3 loaded and ready");
    }
}
