//! API client layer.
//!
//! Each method is exactly one HTTP round trip: no retries, no caching.
//! Retry policy, if any, belongs to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;

use mural_shared::constants::{
    PATH_COMMENTS, PATH_LOGIN, PATH_POSTS, PATH_PROFILE, PATH_REGISTER,
};
use mural_shared::protocol::{
    AuthResponse, CreateCommentRequest, CreatePostRequest, ErrorBody, LikeToggleResponse,
    LoginRequest, RegisterRequest,
};
use mural_shared::validate::require_content;
use mural_shared::{Comment, Post, User};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::Session;

/// Account operations used by the session store.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError>;

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// Fetch the profile of the user owning `token`.
    async fn profile(&self, token: &str) -> Result<User, ApiError>;
}

/// Feed operations used by the feed controller.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Every post, fully populated with likes and comments.
    async fn list_posts(&self) -> Result<Vec<Post>, ApiError>;

    async fn create_post(&self, content: &str) -> Result<Post, ApiError>;

    async fn toggle_like(&self, post_id: &str) -> Result<LikeToggleResponse, ApiError>;

    async fn create_comment(
        &self,
        author_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<Comment, ApiError>;
}

#[async_trait]
impl<T: FeedApi + ?Sized> FeedApi for Arc<T> {
    async fn list_posts(&self) -> Result<Vec<Post>, ApiError> {
        (**self).list_posts().await
    }

    async fn create_post(&self, content: &str) -> Result<Post, ApiError> {
        (**self).create_post(content).await
    }

    async fn toggle_like(&self, post_id: &str) -> Result<LikeToggleResponse, ApiError> {
        (**self).toggle_like(post_id).await
    }

    async fn create_comment(
        &self,
        author_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<Comment, ApiError> {
        (**self).create_comment(author_id, post_id, content).await
    }
}

/// reqwest implementation of [`AuthApi`] and [`FeedApi`].
#[derive(Clone)]
pub struct HttpApi {
    http: Client,
    base_url: Url,
    session: Option<watch::Receiver<Session>>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("mural-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }

        Ok(Self {
            http,
            base_url,
            session: None,
        })
    }

    /// Attach the session channel; its token is read at call time and sent
    /// as `Authorization: Bearer`.
    pub fn with_session(mut self, session: watch::Receiver<Session>) -> Self {
        self.session = Some(session);
        self
    }

    fn url(&self, path: &str) -> Url {
        self.url_from(path.split('/').filter(|s| !s.is_empty()))
    }

    /// The post id is a single path segment, percent-encoded.
    fn likes_url(&self, post_id: &str) -> Url {
        let posts = PATH_POSTS.split('/').filter(|s| !s.is_empty());
        self.url_from(posts.chain([post_id, "likes"]))
    }

    fn url_from<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn token(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|rx| rx.borrow().token.clone())
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.token().ok_or(ApiError::NotAuthenticated)?;
        Ok(req.bearer_auth(token))
    }
}

/// Turn a response into `T`, or into [`ApiError::RequestFailed`] carrying the
/// status and the server's `error` message.
async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()));
    }

    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };

    debug!(status = status.as_u16(), %message, "API request failed");

    Err(ApiError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(self.url(PATH_LOGIN)).json(&body).send().await?;
        parse(resp).await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        require_content("name", &req.name)?;
        require_content("email", &req.email)?;
        let resp = self.http.post(self.url(PATH_REGISTER)).json(req).send().await?;
        parse(resp).await
    }

    async fn profile(&self, token: &str) -> Result<User, ApiError> {
        let resp = self
            .http
            .get(self.url(PATH_PROFILE))
            .bearer_auth(token)
            .send()
            .await?;
        parse(resp).await
    }
}

#[async_trait]
impl FeedApi for HttpApi {
    async fn list_posts(&self) -> Result<Vec<Post>, ApiError> {
        let resp = self.http.get(self.url(PATH_POSTS)).send().await?;
        parse(resp).await
    }

    async fn create_post(&self, content: &str) -> Result<Post, ApiError> {
        let content = require_content("content", content)?;
        let req = self.authorized(self.http.post(self.url(PATH_POSTS)))?;
        let resp = req
            .json(&CreatePostRequest {
                content: content.to_string(),
            })
            .send()
            .await?;
        parse(resp).await
    }

    async fn toggle_like(&self, post_id: &str) -> Result<LikeToggleResponse, ApiError> {
        let req = self.authorized(self.http.post(self.likes_url(post_id)))?;
        let resp = req.send().await?;
        parse(resp).await
    }

    async fn create_comment(
        &self,
        author_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<Comment, ApiError> {
        let content = require_content("content", content)?;
        let body = CreateCommentRequest {
            content: Some(content.to_string()),
            author_id: Some(author_id.to_string()),
            post_id: Some(post_id.to_string()),
        };
        let resp = self.http.post(self.url(PATH_COMMENTS)).json(&body).send().await?;
        parse(resp).await
    }
}
