//! REST API for facedb.
//!
//! A thin JSON adapter over a shared [`EmbeddingStore`]. The store is opened
//! once by the caller and handed to the app as `web::Data`; handlers never
//! touch the backing file themselves. Embeddings are produced upstream, so
//! requests carry vectors rather than images.
//!
//! ## Endpoints
//!
//! - `GET  /api/status` - Store size and configured model
//! - `POST /api/face/recognize` - Match an embedding against known identities
//! - `POST /api/face/register` - Enroll a new identity
//! - `GET  /api/user/list` - All identities, without embeddings
//! - `GET  /api/user/count` - Number of identities
//! - `GET  /api/user/{id}` - One identity, without its embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer};
//! use facedb::{EmbeddingStore, StoreConfig};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let store = web::Data::new(EmbeddingStore::open(StoreConfig::from_env()));
//!     HttpServer::new(move || App::new().app_data(store.clone()).configure(facedb::server::config))
//!         .bind("0.0.0.0:7878")?
//!         .run()
//!         .await
//! }
//! ```

use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::vector::first_non_finite;
use crate::{EmbeddingStore, Metadata, Record, RecordSummary, StoreError};


// --- Request structs ---

#[derive(Deserialize)]
struct RecognizeRequest {
    embedding: Vec<f64>,
    threshold: Option<f64>,
}

#[derive(Deserialize)]
struct RegisterRequest {
    embedding: Vec<f64>,
    #[serde(rename = "userData", default)]
    user_data: Metadata,
    model: Option<String>,
}

// --- Response structs ---

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    users_count: usize,
    model: String,
}

#[derive(Serialize)]
struct UserView {
    id: String,
    data: Metadata,
    timestamp: DateTime<Utc>,
    model: String,
}

impl From<RecordSummary> for UserView {
    fn from(summary: RecordSummary) -> Self {
        UserView {
            id: summary.id,
            data: summary.metadata,
            timestamp: summary.created_at,
            model: summary.model_tag,
        }
    }
}

impl From<Record> for UserView {
    fn from(record: Record) -> Self {
        record.summary().into()
    }
}

#[derive(Serialize)]
struct RecognizeResponse {
    success: bool,
    recognized: bool,
    user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<f64>,
}

#[derive(Serialize)]
struct RegisterResponse {
    success: bool,
    user_id: String,
    message: String,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    users: Vec<UserView>,
    count: usize,
}

#[derive(Serialize)]
struct CountResponse {
    success: bool,
    count: usize,
}

#[derive(Serialize)]
struct UserResponse {
    success: bool,
    user: UserView,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({"error": message.into()}))
}

// --- Handlers ---

async fn status_handler(store: web::Data<EmbeddingStore>) -> impl Responder {
    HttpResponse::Ok().json(StatusResponse {
        status: "online",
        users_count: store.count(),
        model: store.model_tag().to_string(),
    })
}

async fn recognize_handler(store: web::Data<EmbeddingStore>, body: web::Json<RecognizeRequest>) -> impl Responder {
    if body.embedding.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No embedding provided");
    }
    if first_non_finite(&body.embedding).is_some() {
        return error_response(StatusCode::BAD_REQUEST, "Embedding must only contain finite numbers");
    }

    let threshold = body.threshold.unwrap_or(store.config().match_threshold);
    let response = match store.find(&body.embedding, threshold) {
        Some(hit) => RecognizeResponse {
            success: true,
            recognized: true,
            user: Some(hit.record.into()),
            distance: Some(hit.distance),
        },
        None => RecognizeResponse { success: true, recognized: false, user: None, distance: None },
    };

    HttpResponse::Ok().json(response)
}

async fn register_handler(store: web::Data<EmbeddingStore>, body: web::Json<RegisterRequest>) -> impl Responder {
    let RegisterRequest { embedding, user_data, model } = body.into_inner();
    let model = model.unwrap_or_else(|| store.model_tag().to_string());

    // Persisting does blocking file I/O.
    let result = web::block(move || store.add(user_data, embedding, model)).await;

    match result {
        Ok(Ok(user_id)) => HttpResponse::Ok().json(RegisterResponse {
            success: true,
            user_id,
            message: "User registered successfully".to_string(),
        }),
        Ok(Err(StoreError::EmptyEmbedding)) => {
            error_response(StatusCode::BAD_REQUEST, "No embedding provided")
        }
        Ok(Err(e @ StoreError::NonFiniteEmbedding { .. })) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e)) => {
            tracing::error!("register failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn list_handler(store: web::Data<EmbeddingStore>) -> impl Responder {
    let users: Vec<UserView> = store.list().into_iter().map(UserView::from).collect();
    let count = users.len();

    HttpResponse::Ok().json(ListResponse { success: true, users, count })
}

async fn count_handler(store: web::Data<EmbeddingStore>) -> impl Responder {
    HttpResponse::Ok().json(CountResponse { success: true, count: store.count() })
}

async fn user_handler(store: web::Data<EmbeddingStore>, id: web::Path<String>) -> impl Responder {
    match store.get(&id) {
        Some(record) => HttpResponse::Ok().json(UserResponse { success: true, user: record.into() }),
        None => error_response(StatusCode::NOT_FOUND, format!("User '{}' not found", id)),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/status").route(web::get().to(status_handler)))
       .service(web::resource("/api/face/recognize").route(web::post().to(recognize_handler)))
       .service(web::resource("/api/face/register").route(web::post().to(register_handler)))
       .service(web::resource("/api/user/list").route(web::get().to(list_handler)))
       .service(web::resource("/api/user/count").route(web::get().to(count_handler)))
       .service(web::resource("/api/user/{id}").route(web::get().to(user_handler)));
}
