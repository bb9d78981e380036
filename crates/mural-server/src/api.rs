use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use mural_shared::constants::{
    COMMENT_FIELDS_REQUIRED, PATH_COMMENTS, PATH_HEALTH, PATH_LOGIN, PATH_POSTS, PATH_POST_LIKES,
    PATH_PROFILE, PATH_REGISTER,
};
use mural_shared::protocol::{
    AuthResponse, CreateCommentRequest, CreatePostRequest, HealthResponse, LikeToggleResponse,
    LoginRequest, RegisterRequest,
};
use mural_shared::validate::{require_content, require_field};
use mural_shared::{Comment, Post, User, ValidationError};
use mural_store::{Database, NewUser, StoreError};

use crate::auth::{self, SessionRegistry};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::throttle::{throttle_writes, WriteThrottle};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub sessions: SessionRegistry,
    pub throttle: WriteThrottle,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: SessionRegistry::new(config.session_ttl_secs),
            throttle: WriteThrottle::new(config.write_rate_per_min, config.write_burst),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(PATH_HEALTH, get(health_check))
        .route(PATH_REGISTER, post(register))
        .route(PATH_LOGIN, post(login))
        .route(PATH_PROFILE, get(profile))
        .route(PATH_POSTS, get(list_posts).post(create_post))
        .route(PATH_POST_LIKES, post(toggle_like))
        .route(PATH_COMMENTS, post(create_comment))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(middleware::from_fn_with_state(state.clone(), throttle_writes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_json(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ─── Auth ───

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    let Json(req) = payload.map_err(bad_json)?;

    let name = require_content("name", &req.name)?;
    let email = require_content("email", &req.email)?.to_lowercase();
    if req.password.is_empty() {
        return Err(ValidationError::Empty { field: "password" }.into());
    }

    let (password_hash, password_salt) = auth::hash_password(&req.password);
    let user = state.db.lock().await.create_user(&NewUser {
        id: None,
        name: name.to_string(),
        email,
        avatar: req.avatar.filter(|a| !a.trim().is_empty()),
        password_hash,
        password_salt,
    })?;

    let token = state.sessions.issue(&user.id).await;
    info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServerError> {
    let Json(req) = payload.map_err(bad_json)?;
    let email = req.email.trim().to_lowercase();

    let lookup = state.db.lock().await.user_credentials(&email);
    let creds = match lookup {
        Ok(creds) => creds,
        Err(StoreError::NotFound) => {
            return Err(ServerError::Unauthorized("Invalid email or password".into()))
        }
        Err(e) => return Err(e.into()),
    };

    if !auth::verify_password(&req.password, &creds.password_salt, &creds.password_hash) {
        warn!(user_id = %creds.user.id, "Login rejected");
        return Err(ServerError::Unauthorized("Invalid email or password".into()));
    }

    let token = state.sessions.issue(&creds.user.id).await;
    info!(user_id = %creds.user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: creds.user,
    }))
}

async fn profile(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<User>, ServerError> {
    let user_id = state.sessions.authenticate(&headers).await?;

    match state.db.lock().await.get_user(&user_id) {
        Ok(user) => Ok(Json(user)),
        Err(StoreError::NotFound) => Err(ServerError::Unauthorized("Unknown user".into())),
        Err(e) => Err(e.into()),
    }
}

// ─── Posts ───

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ServerError> {
    let posts = state.db.lock().await.list_posts()?;
    Ok(Json(posts))
}

async fn create_post(
    headers: HeaderMap,
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), ServerError> {
    let author_id = state.sessions.authenticate(&headers).await?;
    let Json(req) = payload.map_err(bad_json)?;
    let content = require_content("content", &req.content)?;

    let post = state.db.lock().await.create_post(&author_id, content)?;
    info!(post_id = %post.id, author_id = %author_id, "Post created");

    Ok((StatusCode::CREATED, Json(post)))
}

async fn toggle_like(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<LikeToggleResponse>, ServerError> {
    let user_id = state.sessions.authenticate(&headers).await?;

    let toggle = match state.db.lock().await.toggle_like(&post_id, &user_id) {
        Ok(toggle) => toggle,
        Err(StoreError::NotFound) => return Err(ServerError::NotFound("Post")),
        Err(e) => return Err(e.into()),
    };

    info!(post_id = %post_id, user_id = %user_id, liked = toggle.liked, "Like toggled");

    Ok(Json(LikeToggleResponse {
        post_id,
        liked: toggle.liked,
        like_count: toggle.like_count,
    }))
}

// ─── Comments ───

/// `POST /api/comments`: 400 when any field is missing or blank, 201 with
/// the created comment, 500 when the insert fails.
async fn create_comment(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), ServerError> {
    let Json(req) = payload.map_err(bad_json)?;

    let required = || ServerError::BadRequest(COMMENT_FIELDS_REQUIRED.to_string());
    let author_id = require_field("authorId", req.author_id.as_deref()).map_err(|_| required())?;
    let post_id = require_field("postId", req.post_id.as_deref()).map_err(|_| required())?;
    let content = match require_field("content", req.content.as_deref()) {
        Ok(content) => content,
        Err(ValidationError::Empty { .. }) => return Err(required()),
        Err(e) => return Err(e.into()),
    };

    info!(post_id = %post_id, "Creating comment");

    let comment = state
        .db
        .lock()
        .await
        .create_comment(post_id, author_id, content)
        .map_err(|e| {
            error!(error = %e, post_id = %post_id, "Failed to create comment");
            ServerError::CommentCreateFailed
        })?;

    info!(comment_id = %comment.id, "Comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
