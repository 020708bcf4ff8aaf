//! Prediction endpoints
//!
//! - `POST /api/predict`: validate and store the upload, answer with the
//!   stub prediction plus upload metadata
//! - `POST /predict`: label-only answer in the shape of the model service
//!
//! Both read the image from the multipart field `image`.

use std::time::Instant;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use flavorsnap_common::logging::logger::duration_ms;
use flavorsnap_common::validate::ValidationError;
use flavorsnap_common::{Fields, UploadFile};
use serde::Serialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::storage::store_upload;
use crate::AppState;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Response of `POST /api/predict`
#[derive(Debug, Serialize)]
pub struct UploadPrediction {
    pub success: bool,
    pub prediction: String,
    pub confidence: f64,
    pub metadata: UploadMetadata,
}

#[derive(Debug, Serialize)]
pub struct UploadMetadata {
    /// Stored file name
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Response of `POST /predict`
#[derive(Debug, Serialize)]
pub struct LabelPrediction {
    pub label: String,
}

/// POST /api/predict
pub async fn predict_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadPrediction>> {
    let upload = read_image(&state, multipart).await?;

    let file = state.validator.validate(upload.as_ref()).map_err(|err| {
        log_rejection(&state, &err, upload.as_ref());
        ApiError::from(err)
    })?;

    let stored = match store_upload(&state.server.upload_dir, file).await {
        Ok(stored) => stored,
        Err(err) => {
            let mut fields = Fields::new();
            fields.insert("upload_dir".into(), json!(state.server.upload_dir.display().to_string()));
            fields.insert("file_name".into(), json!(file.file_name));
            state.logger.log_error_with_traceback("Upload Error", &err, fields);
            return Err(ApiError::Io(err));
        }
    };

    let mut fields = Fields::new();
    fields.insert("file_path".into(), json!(stored.path.display().to_string()));
    fields.insert("file_size".into(), json!(file.size()));
    fields.insert("file_name".into(), json!(stored.file_name));
    state.logger.info("File uploaded successfully", fields);

    let response = UploadPrediction {
        success: true,
        prediction: state.server.stub_label.clone(),
        confidence: state.server.stub_confidence,
        metadata: UploadMetadata {
            filename: stored.file_name,
            size: file.size(),
            content_type: file.content_type.clone(),
        },
    };

    let mut fields = Fields::new();
    fields.insert("prediction".into(), json!(response.prediction));
    fields.insert("confidence".into(), json!(response.confidence));
    state.logger.info("Prediction completed", fields);

    Ok(Json(response))
}

/// POST /predict
pub async fn predict_label(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<LabelPrediction>> {
    let started = Instant::now();

    let Some(upload) = read_image(&state, multipart).await? else {
        state.logger.warning("No image uploaded in request", Fields::new());
        return Err(ApiError::BadRequest("No image uploaded".to_string()));
    };

    let mut fields = Fields::new();
    fields.insert("filename".into(), json!(upload.file_name));
    fields.insert("content_type".into(), json!(upload.content_type));
    state.logger.info("Processing image prediction", fields);

    state.validator.validate(Some(&upload)).map_err(|err| {
        log_rejection(&state, &err, Some(&upload));
        ApiError::from(err)
    })?;

    let label = state.server.stub_label.clone();

    let mut fields = Fields::new();
    fields.insert("predicted_label".into(), json!(label));
    fields.insert("processing_time_ms".into(), json!(duration_ms(started.elapsed())));
    state.logger.info("Prediction completed successfully", fields);

    Ok(Json(LabelPrediction { label }))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict", post(predict_upload))
        .route("/predict", post(predict_label))
}

/// First `image` field of the form, if any; other fields are skipped
async fn read_image(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Option<UploadFile>> {
    let mut multipart = multipart.map_err(|rejection| {
        let mut fields = Fields::new();
        fields.insert("reason".into(), json!(rejection.body_text()));
        state.logger.warning("Request is not a multipart form", fields);
        ApiError::BadRequest(rejection.body_text())
    })?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;

        // Browsers send an empty part when no file was chosen
        if file_name.is_empty() && data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadFile::new(file_name, content_type, data.to_vec())));
    }

    Ok(None)
}

fn log_rejection(state: &AppState, err: &ValidationError, upload: Option<&UploadFile>) {
    let mut fields = Fields::new();
    let message = match err {
        ValidationError::Missing => "No image provided in request",
        ValidationError::UnsupportedType { .. } => {
            fields.insert("valid_types".into(), json!(state.validator.accepted_types()));
            "Invalid file type uploaded"
        }
        ValidationError::TooLarge { max_bytes, .. } => {
            fields.insert("max_bytes".into(), json!(max_bytes));
            "Uploaded file too large"
        }
    };
    if let Some(upload) = upload {
        fields.insert("file_type".into(), json!(upload.content_type));
        fields.insert("file_name".into(), json!(upload.file_name));
        fields.insert("file_size".into(), json!(upload.size()));
    }
    state.logger.warning(message, fields);
}
