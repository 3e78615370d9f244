//! actix-web routes exposing the scheduler as a REST API.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use tracing::info;

use crate::core::Scheduler;

use super::api::{self, ApiError};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SHUTDOWN_TIMEOUT_SECS: u64 = 15;

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(ResponseError::status_code(self)).json(self.to_response())
    }
}

async fn create_task(
    scheduler: web::Data<Scheduler>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let created = api::create_task(&scheduler, &body)?;
    Ok(HttpResponse::Ok().json(created))
}

async fn list_tasks(scheduler: web::Data<Scheduler>) -> HttpResponse {
    HttpResponse::Ok().json(api::list_tasks(&scheduler))
}

async fn get_task(
    scheduler: web::Data<Scheduler>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task = api::get_task(&scheduler, &id)?;
    Ok(HttpResponse::Ok().json(task))
}

async fn delete_task(
    scheduler: web::Data<Scheduler>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let deleted = api::delete_task(&scheduler, &id)?;
    Ok(HttpResponse::Ok().json(deleted))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(api::health())
}

/// Register the task routes. The app must carry `web::Data<Scheduler>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/tasks", web::post().to(create_task))
        .route("/tasks", web::get().to(list_tasks))
        .route("/tasks/{id}", web::get().to(get_task))
        .route("/tasks/{id}", web::delete().to(delete_task))
        .route("/health", web::get().to(health));
}

/// Run the HTTP server until it receives a shutdown signal.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(address: &str, scheduler: Arc<Scheduler>) -> std::io::Result<()> {
    let data = web::Data::from(scheduler);
    info!(address, "Listening");

    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .keep_alive(KEEP_ALIVE)
        .client_request_timeout(CLIENT_REQUEST_TIMEOUT)
        .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
        .bind(address)?
        .run()
        .await
}
