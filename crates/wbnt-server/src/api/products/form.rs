//! Product create/update bodies arrive either as JSON or as a multipart form
//! carrying an optional `image` file. Both are flattened into one field map
//! and parsed leniently, the way the dashboard's forms send them.

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::{Map, Value};
use wbnt_core::{checkout::parse_leading_int, ProductStatus};

use crate::middleware::request_id_of;

use super::super::{
    extract::json_rejection,
    uploads::{multipart_error, UploadedImage},
    ApiError, AppState,
};

const IMAGE_FIELD: &str = "image";

/// Raw product fields plus the uploaded image, if any.
#[derive(Debug, Default)]
pub(in crate::api) struct ProductForm {
    pub fields: Map<String, Value>,
    pub image: Option<UploadedImage>,
}

impl FromRequest<AppState> for ProductForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let rid = request_id_of(&req);

        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| json_rejection(&rid, &e))?;
            return match value {
                Value::Object(fields) => Ok(Self {
                    fields,
                    image: None,
                }),
                _ => Err(ApiError::new(
                    &rid,
                    "bad_request",
                    "request body must be a JSON object",
                )),
            };
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(&rid, "bad_request", e.body_text()))?;

        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&rid, &e))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == IMAGE_FIELD {
                // An empty file input still posts a part with a blank filename.
                if field.file_name().is_some_and(|f| !f.is_empty()) {
                    form.image = Some(state.uploads.read_field(&rid, field).await?);
                }
                continue;
            }
            let text = field.text().await.map_err(|e| multipart_error(&rid, &e))?;
            form.fields.insert(name, Value::String(text));
        }
        Ok(form)
    }
}

/// Typed view of the submitted fields. `None` means "not supplied"; for the
/// nullable text columns `Some(None)` means "clear it".
#[allow(clippy::option_option)]
#[derive(Debug, Default, PartialEq)]
pub(in crate::api) struct ProductInput {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub size: Option<String>,
    pub status: Option<ProductStatus>,
    pub category: Option<Option<String>>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub description: Option<Option<String>>,
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_owned()),
        other => Some(other.to_string()),
    }
}

/// Present and non-blank, as trimmed text.
fn filled(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(text_of).filter(|s| !s.is_empty())
}

#[allow(clippy::cast_possible_truncation)]
fn int_field(rid: &str, fields: &Map<String, Value>, key: &str) -> Result<Option<i64>, ApiError> {
    let parsed = match fields.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => parse_leading_int(s),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v >= 0 => Ok(Some(v)),
        Some(_) => Err(ApiError::new(
            rid,
            "validation_error",
            format!("{key} must not be negative"),
        )),
        None => Err(ApiError::new(
            rid,
            "validation_error",
            format!("{key} must be a whole number"),
        )),
    }
}

fn rating_field(rid: &str, fields: &Map<String, Value>) -> Result<Option<f64>, ApiError> {
    let parsed = match fields.get("rating") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(r) if (0.0..=5.0).contains(&r) => Ok(Some(r)),
        _ => Err(ApiError::new(
            rid,
            "validation_error",
            "rating must be a number between 0 and 5",
        )),
    }
}

#[allow(clippy::option_option)]
fn nullable_text(fields: &Map<String, Value>, key: &str) -> Option<Option<String>> {
    fields
        .get(key)
        .map(|v| text_of(v).filter(|s| !s.is_empty()))
}

/// Parse and validate the submitted fields.
pub(in crate::api) fn parse_product_input(
    rid: &str,
    fields: &Map<String, Value>,
) -> Result<ProductInput, ApiError> {
    let status = match filled(fields, "status") {
        None => None,
        Some(raw) => Some(raw.parse::<ProductStatus>().map_err(|_| {
            ApiError::new(rid, "validation_error", "status must be Available or Sold")
        })?),
    };

    Ok(ProductInput {
        name: fields.get("name").and_then(text_of),
        price: int_field(rid, fields, "price")?,
        size: filled(fields, "size"),
        status,
        category: nullable_text(fields, "category"),
        rating: rating_field(rid, fields)?,
        review_count: int_field(rid, fields, "review_count")?,
        description: nullable_text(fields, "description"),
    })
}
