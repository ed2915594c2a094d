// src/main.rs

mod app_state;
mod auth;
mod config;
mod dashboard_data;
mod deadline;
mod error;
mod export;
mod migrations;
mod models;
mod store;
mod task;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::{self, StatusCode},
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer, ResponseError,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::{debug, info};

use crate::app_state::AppState;
use crate::auth::{login, logout, signup, validate_jwt, CurrentUser, SESSION_COOKIE};
use crate::dashboard_data::get_dashboard;
use crate::error::{AppError, Notice};
use crate::export::export_csv;
use crate::task::{create_task, delete_task, edit_task, update_status};

/// Resolves the session token, if any, into a [`CurrentUser`] request
/// extension. Requests without a token pass through anonymously.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: &str) -> Self {
        Authentication {
            secret: secret.to_string(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let auth_str = req
        .headers()
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // An explicit bearer token must be valid; a stale cookie is ignored
        // so the login routes stay reachable.
        if let Some(token) = bearer_token(&req) {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(CurrentUser::from(claims));
                }
                Err(e) => {
                    let (req_parts, _payload) = req.into_parts();
                    let resp = AppError::InvalidToken(e).error_response();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        } else if let Some(cookie) = req.cookie(SESSION_COOKIE) {
            match validate_jwt(cookie.value(), &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(CurrentUser::from(claims));
                }
                Err(e) => debug!("Ignoring invalid session cookie: {}", e),
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

/// GET /
async fn index(user: Option<CurrentUser>) -> HttpResponse {
    let target = if user.is_some() { "/dashboard" } else { "/auth/login" };
    HttpResponse::SeeOther()
        .insert_header((http::header::LOCATION, target))
        .finish()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let resp =
            Notice::new("Invalid request body.", "/dashboard").respond(StatusCode::BAD_REQUEST);
        InternalError::from_response(err, resp).into()
    }))
    .route("/", web::get().to(index))
    .service(
        web::scope("/auth")
            .route("/register", web::post().to(signup))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout)),
    )
    .route("/dashboard", web::get().to(get_dashboard))
    .service(
        web::scope("/tasks")
            .route("", web::post().to(create_task))
            .route("/{task_id}", web::put().to(edit_task))
            .route("/{task_id}", web::delete().to(delete_task))
            .route("/{task_id}/status", web::put().to(update_status)),
    )
    .route("/export/csv", web::get().to(export_csv));
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = store::connect(&config).await.map_err(io::Error::other)?;
    let applied = store.migrate().await.map_err(io::Error::other)?;
    info!("Schema migrations applied at startup: {}", applied);

    let bind_address = config.bind_address.clone();
    info!("Server running at http://{}", bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let state = AppState { store, config };

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&state.config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(&state.config.jwt_secret))
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}
