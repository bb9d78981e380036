//! Feed state controller.
//!
//! The controller owns the post list shown to the user and publishes every
//! change as an immutable [`FeedSnapshot`] on a `watch` channel. Mutations
//! never patch the list locally: a successful create, like or comment is
//! followed by a full [`FeedController::load`], and the list on screen is
//! always a server response taken as a whole.
//!
//! Loads are sequenced by issue order. Each load takes a ticket; a response
//! is applied only if no later-issued load has already been applied, so the
//! list converges to the most recently requested load no matter in which
//! order responses arrive.
//!
//! A mutation rejected with 401 means the stored token is dead: the session
//! is invalidated and the failure is reported as `NotAuthenticated`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use mural_shared::validate::require_content;
use mural_shared::Post;

use crate::api::FeedApi;
use crate::error::{ApiError, FeedError};
use crate::session::{Session, SessionInvalidator};

/// Per-post interaction state, keyed by post id in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostUiState {
    /// Unsent comment text.
    pub draft: String,
    pub commenting: bool,
    pub liking: bool,
    /// Last failure scoped to this post.
    pub error: Option<FeedError>,
}

/// Everything the presentation layer renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Last applied server response, newest post first.
    pub posts: Arc<Vec<Post>>,
    /// At least one load has succeeded.
    pub loaded: bool,
    pub loading: bool,
    /// A post is being published.
    pub creating: bool,
    /// Last global failure (feed load or post creation).
    pub last_error: Option<FeedError>,
    pub post_states: HashMap<String, PostUiState>,
    /// Bumped on every published change.
    pub revision: u64,
}

impl FeedSnapshot {
    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn post_state(&self, post_id: &str) -> Option<&PostUiState> {
        self.post_states.get(post_id)
    }

    pub fn draft(&self, post_id: &str) -> &str {
        self.post_state(post_id).map_or("", |s| s.draft.as_str())
    }

    pub fn is_liking(&self, post_id: &str) -> bool {
        self.post_state(post_id).is_some_and(|s| s.liking)
    }

    pub fn is_commenting(&self, post_id: &str) -> bool {
        self.post_state(post_id).is_some_and(|s| s.commenting)
    }

    pub fn post_error(&self, post_id: &str) -> Option<&FeedError> {
        self.post_state(post_id).and_then(|s| s.error.as_ref())
    }
}

/// Load ordering bookkeeping.
#[derive(Debug, Default)]
struct Sequencer {
    /// Ticket of the most recently issued load.
    issued: u64,
    /// Ticket of the most recently applied successful load.
    applied: u64,
    /// Ticket of the load whose failure is currently shown.
    failed_at: u64,
    in_flight: usize,
}

struct Inner<A> {
    api: A,
    session: watch::Receiver<Session>,
    state: watch::Sender<FeedSnapshot>,
    seq: Mutex<Sequencer>,
    invalidator: Option<Arc<dyn SessionInvalidator>>,
}

/// Cheap to clone; clones share the same state.
pub struct FeedController<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for FeedController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: FeedApi> FeedController<A> {
    /// `session` supplies the author id for comments.
    pub fn new(api: A, session: watch::Receiver<Session>) -> Self {
        Self::build(api, session, None)
    }

    /// Like [`new`](Self::new), and hand rejected sessions to `invalidator`.
    pub fn with_invalidator(
        api: A,
        session: watch::Receiver<Session>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Self {
        Self::build(api, session, Some(invalidator))
    }

    fn build(
        api: A,
        session: watch::Receiver<Session>,
        invalidator: Option<Arc<dyn SessionInvalidator>>,
    ) -> Self {
        let (state, _rx) = watch::channel(FeedSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                api,
                session,
                state,
                seq: Mutex::new(Sequencer::default()),
                invalidator,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.state.borrow().clone()
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Fetch the whole feed and replace the post list with it.
    ///
    /// On failure the previous list stays in place and `FetchFailed` is
    /// recorded in `last_error`, unless a later-issued load already
    /// succeeded.
    pub async fn load(&self) -> Result<(), FeedError> {
        let ticket = self.begin_load();
        let result = self.inner.api.list_posts().await;
        self.finish_load(ticket, result)
    }

    fn begin_load(&self) -> u64 {
        let ticket = {
            let mut seq = self.sequencer();
            seq.issued += 1;
            seq.in_flight += 1;
            seq.issued
        };
        debug!(ticket, "Feed load issued");
        self.update(|s| s.loading = true);
        ticket
    }

    fn finish_load(&self, ticket: u64, result: Result<Vec<Post>, ApiError>) -> Result<(), FeedError> {
        let mut seq = self.sequencer();
        seq.in_flight = seq.in_flight.saturating_sub(1);
        let loading = seq.in_flight > 0;

        match result {
            Ok(posts) => {
                let apply = ticket > seq.applied;
                if apply {
                    seq.applied = ticket;
                }
                let clears_failure = ticket >= seq.failed_at;
                drop(seq);

                if apply {
                    debug!(ticket, posts = posts.len(), "Feed load applied");
                } else {
                    debug!(ticket, "Discarding superseded feed response");
                }

                self.update(|s| {
                    s.loading = loading;
                    if apply {
                        // Drop state of posts that are gone, unless a
                        // mutation on them is still running.
                        let ids: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
                        s.post_states
                            .retain(|id, p| p.liking || p.commenting || ids.contains(id.as_str()));
                        s.posts = Arc::new(posts);
                        s.loaded = true;
                    }
                    if clears_failure && matches!(s.last_error, Some(FeedError::FetchFailed(_))) {
                        s.last_error = None;
                    }
                });
                Ok(())
            }
            Err(e) => {
                let err = FeedError::FetchFailed(e.user_message());
                let record = ticket >= seq.applied;
                if record {
                    seq.failed_at = ticket;
                }
                drop(seq);

                warn!(ticket, error = %e, "Feed load failed");
                let shown = err.clone();
                self.update(|s| {
                    s.loading = loading;
                    if record {
                        s.last_error = Some(shown);
                    }
                });
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Publish a new post, then reload.
    ///
    /// Blank content is rejected without a request. On failure the caller
    /// keeps its compose text; the controller never owns it.
    pub async fn create_post(&self, content: &str) -> Result<(), FeedError> {
        let content = match require_content("content", content) {
            Ok(content) => content,
            Err(e) => return Err(self.global_failure(FeedError::Validation(e))),
        };

        let claimed = self.try_update(|s| {
            if s.creating {
                return false;
            }
            s.creating = true;
            if matches!(
                s.last_error,
                Some(FeedError::Validation(_) | FeedError::NotAuthenticated | FeedError::CreateFailed(_))
            ) {
                s.last_error = None;
            }
            true
        });
        if !claimed {
            return Err(FeedError::AlreadyPending);
        }

        match self.inner.api.create_post(content).await {
            Ok(post) => {
                info!(post_id = %post.id, "Post created");
                let _ = self.load().await;
                self.update(|s| s.creating = false);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Post creation failed");
                let err = match e {
                    e if self.rejects_session(&e) => FeedError::NotAuthenticated,
                    ApiError::Validation(v) => FeedError::Validation(v),
                    other => FeedError::CreateFailed(other.user_message()),
                };
                let shown = err.clone();
                self.update(|s| {
                    s.creating = false;
                    s.last_error = Some(shown);
                });
                Err(err)
            }
        }
    }

    /// Toggle the viewer's like on `post_id`, then reload.
    ///
    /// While the toggle and its reload are in flight the post is marked
    /// `liking` and further calls for it return `AlreadyPending` without a
    /// request.
    pub async fn like(&self, post_id: &str) -> Result<(), FeedError> {
        let claimed = self.try_update(|s| {
            let state = s.post_states.entry(post_id.to_string()).or_default();
            if state.liking {
                return false;
            }
            state.liking = true;
            if matches!(state.error, Some(FeedError::LikeFailed { .. })) {
                state.error = None;
            }
            true
        });
        if !claimed {
            debug!(post_id, "Like already pending");
            return Err(FeedError::AlreadyPending);
        }

        match self.inner.api.toggle_like(post_id).await {
            Ok(toggle) => {
                debug!(post_id, liked = toggle.liked, count = toggle.like_count, "Like toggled");
                let _ = self.load().await;
                self.update_post(post_id, |p| p.liking = false);
                Ok(())
            }
            Err(e) => {
                warn!(post_id, error = %e, "Like failed");
                let err = match e {
                    e if self.rejects_session(&e) => FeedError::NotAuthenticated,
                    other => FeedError::LikeFailed {
                        post_id: post_id.to_string(),
                        message: other.user_message(),
                    },
                };
                let shown = err.clone();
                self.update_post(post_id, |p| {
                    p.liking = false;
                    p.error = Some(shown);
                });
                Err(err)
            }
        }
    }

    /// Add a comment as the logged-in user, then reload.
    ///
    /// On success the draft of `post_id` is cleared; drafts of other posts
    /// are untouched. On failure the draft is kept and the error is recorded
    /// on that post only.
    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<(), FeedError> {
        let content = match require_content("content", content) {
            Ok(content) => content,
            Err(e) => return Err(self.post_failure(post_id, FeedError::Validation(e))),
        };

        let author_id = self.inner.session.borrow().user.as_ref().map(|u| u.id.clone());
        let Some(author_id) = author_id else {
            return Err(self.post_failure(post_id, FeedError::NotAuthenticated));
        };

        let claimed = self.try_update(|s| {
            let state = s.post_states.entry(post_id.to_string()).or_default();
            if state.commenting {
                return false;
            }
            state.commenting = true;
            state.error = None;
            true
        });
        if !claimed {
            return Err(FeedError::AlreadyPending);
        }

        match self
            .inner
            .api
            .create_comment(&author_id, post_id, content)
            .await
        {
            Ok(comment) => {
                info!(post_id, comment_id = %comment.id, "Comment added");
                self.update_post(post_id, |p| p.draft.clear());
                let _ = self.load().await;
                self.update_post(post_id, |p| p.commenting = false);
                Ok(())
            }
            Err(e) => {
                warn!(post_id, error = %e, "Comment failed");
                let err = if self.rejects_session(&e) {
                    FeedError::NotAuthenticated
                } else {
                    FeedError::CommentFailed {
                        post_id: post_id.to_string(),
                        message: e.user_message(),
                    }
                };
                let shown = err.clone();
                self.update_post(post_id, |p| {
                    p.commenting = false;
                    p.error = Some(shown);
                });
                Err(err)
            }
        }
    }

    /// Send the current draft of `post_id` as a comment.
    pub async fn submit_draft(&self, post_id: &str) -> Result<(), FeedError> {
        let draft = self.draft(post_id);
        self.add_comment(post_id, &draft).await
    }

    // -----------------------------------------------------------------------
    // Local state
    // -----------------------------------------------------------------------

    pub fn set_draft(&self, post_id: &str, text: impl Into<String>) {
        let text = text.into();
        self.update_post(post_id, |p| p.draft = text);
    }

    pub fn draft(&self, post_id: &str) -> String {
        self.inner.state.borrow().draft(post_id).to_string()
    }

    /// Dismiss the global error banner.
    pub fn clear_error(&self) {
        self.try_update(|s| s.last_error.take().is_some());
    }

    pub fn clear_post_error(&self, post_id: &str) {
        self.try_update(|s| {
            s.post_states
                .get_mut(post_id)
                .is_some_and(|p| p.error.take().is_some())
        });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn sequencer(&self) -> std::sync::MutexGuard<'_, Sequencer> {
        // The sequencer holds plain counters, so a poisoned lock is still
        // consistent.
        self.inner
            .seq
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True when `e` means the session is unusable. A session the server
    /// rejected is invalidated.
    fn rejects_session(&self, e: &ApiError) -> bool {
        if !e.is_auth_failure() {
            return false;
        }
        if let Some(invalidator) = &self.inner.invalidator {
            invalidator.invalidate();
        }
        true
    }

    fn update(&self, f: impl FnOnce(&mut FeedSnapshot)) {
        self.inner.state.send_modify(|s| {
            f(s);
            s.revision += 1;
        });
    }

    /// Apply `f` and publish only if it returns `true`.
    fn try_update(&self, f: impl FnOnce(&mut FeedSnapshot) -> bool) -> bool {
        self.inner.state.send_if_modified(|s| {
            let modified = f(s);
            if modified {
                s.revision += 1;
            }
            modified
        })
    }

    fn update_post(&self, post_id: &str, f: impl FnOnce(&mut PostUiState)) {
        self.update(|s| f(s.post_states.entry(post_id.to_string()).or_default()));
    }

    fn global_failure(&self, err: FeedError) -> FeedError {
        let shown = err.clone();
        self.update(|s| s.last_error = Some(shown));
        err
    }

    fn post_failure(&self, post_id: &str, err: FeedError) -> FeedError {
        let shown = err.clone();
        self.update_post(post_id, |p| p.error = Some(shown));
        err
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::oneshot;

    use mural_shared::protocol::{AuthResponse, LikeToggleResponse, RegisterRequest};
    use mural_shared::{AuthorSummary, Comment, Like, User};

    use super::*;
    use crate::api::AuthApi;
    use crate::session::{RestoreOutcome, SessionStore};
    use crate::storage::MemoryStorage;

    fn ana() -> User {
        User {
            id: "u1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            avatar: None,
        }
    }

    fn post(id: &str, content: &str) -> Post {
        let author = ana().summary();
        Post {
            id: id.into(),
            author_id: author.id.clone(),
            author,
            content: content.into(),
            created_at: Utc::now(),
            likes: Vec::new(),
            comments: Vec::new(),
        }
    }

    type Scripted = oneshot::Receiver<Result<Vec<Post>, ApiError>>;

    /// In-memory stand-in for the server. `list_posts` answers from the
    /// `scripted` queue first, then from the current server state.
    #[derive(Default)]
    struct FakeApi {
        server: Mutex<Vec<Post>>,
        scripted: Mutex<VecDeque<Scripted>>,
        toggle_gate: Mutex<Option<oneshot::Receiver<()>>>,
        comment_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
        fail_lists: AtomicBool,
        fail_creates: AtomicBool,
        fail_comments: AtomicBool,
        /// Answer every mutation with 401, as for an expired token.
        reject_auth: AtomicBool,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
        toggle_calls: AtomicUsize,
        comment_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_posts(posts: Vec<Post>) -> Arc<Self> {
            Arc::new(Self {
                server: Mutex::new(posts),
                ..Self::default()
            })
        }

        fn script(&self) -> oneshot::Sender<Result<Vec<Post>, ApiError>> {
            let (tx, rx) = oneshot::channel();
            self.scripted.lock().unwrap().push_back(rx);
            tx
        }

        fn gate_toggle(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.toggle_gate.lock().unwrap() = Some(rx);
            tx
        }

        fn gate_comment(&self, post_id: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.comment_gates.lock().unwrap().insert(post_id.to_string(), rx);
            tx
        }

        fn calls(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }

        fn check_token(&self) -> Result<(), ApiError> {
            if self.reject_auth.load(Ordering::SeqCst) {
                return Err(ApiError::RequestFailed {
                    status: 401,
                    message: "Invalid or expired token".into(),
                });
            }
            Ok(())
        }
    }

    fn server_error() -> ApiError {
        ApiError::RequestFailed {
            status: 500,
            message: "boom".into(),
        }
    }

    #[async_trait]
    impl FeedApi for FakeApi {
        async fn list_posts(&self) -> Result<Vec<Post>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.scripted.lock().unwrap().pop_front();
            if let Some(rx) = scripted {
                return rx.await.unwrap_or_else(|_| Err(server_error()));
            }
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            Ok(self.server.lock().unwrap().clone())
        }

        async fn create_post(&self, content: &str) -> Result<Post, ApiError> {
            let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.check_token()?;
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err(ApiError::RequestFailed {
                    status: 500,
                    message: "Failed to create post".into(),
                });
            }
            let created = post(&format!("new{n}"), content);
            self.server.lock().unwrap().insert(0, created.clone());
            Ok(created)
        }

        async fn toggle_like(&self, post_id: &str) -> Result<LikeToggleResponse, ApiError> {
            let n = self.toggle_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.toggle_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.check_token()?;

            let mut server = self.server.lock().unwrap();
            let post = server
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or(ApiError::RequestFailed {
                    status: 404,
                    message: "Post not found".into(),
                })?;
            let liked = if post.liked_by("u1") {
                post.likes.retain(|l| l.user_id != "u1");
                false
            } else {
                post.likes.push(Like {
                    id: format!("l{n}"),
                    post_id: post_id.into(),
                    user_id: "u1".into(),
                });
                true
            };
            Ok(LikeToggleResponse {
                post_id: post_id.into(),
                liked,
                like_count: post.likes.len() as u64,
            })
        }

        async fn create_comment(
            &self,
            author_id: &str,
            post_id: &str,
            content: &str,
        ) -> Result<Comment, ApiError> {
            let n = self.comment_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.comment_gates.lock().unwrap().remove(post_id);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.check_token()?;
            if self.fail_comments.load(Ordering::SeqCst) {
                return Err(ApiError::RequestFailed {
                    status: 500,
                    message: "Failed to create comment".into(),
                });
            }
            let comment = Comment {
                id: format!("c{n}"),
                post_id: post_id.into(),
                author_id: author_id.into(),
                author: AuthorSummary {
                    id: author_id.into(),
                    name: "Ana".into(),
                    email: "ana@example.com".into(),
                    avatar: None,
                },
                content: content.into(),
                created_at: Utc::now(),
            };
            let mut server = self.server.lock().unwrap();
            if let Some(post) = server.iter_mut().find(|p| p.id == post_id) {
                post.comments.push(comment.clone());
            }
            Ok(comment)
        }
    }

    /// Auth backend for tests that only restore a persisted session.
    struct OfflineAuth;

    #[async_trait]
    impl AuthApi for OfflineAuth {
        async fn login(&self, _email: &str, _password: &str) -> Result<AuthResponse, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }

        async fn register(&self, _req: &RegisterRequest) -> Result<AuthResponse, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }

        async fn profile(&self, _token: &str) -> Result<User, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }
    }

    fn controller(api: &Arc<FakeApi>, user: Option<User>) -> FeedController<Arc<FakeApi>> {
        let (_tx, rx) = watch::channel(Session {
            token: user.as_ref().map(|_| "tok".to_string()),
            user,
        });
        FeedController::new(Arc::clone(api), rx)
    }

    async fn wait_for_calls(counter: &AtomicUsize, n: usize) {
        while counter.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn load_replaces_posts_wholesale() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));

        feed.load().await.unwrap();
        let snap = feed.snapshot();
        assert!(snap.loaded);
        assert!(!snap.loading);
        assert_eq!(snap.posts.len(), 1);

        *api.server.lock().unwrap() = vec![post("p2", "second"), post("p1", "first")];
        feed.load().await.unwrap();
        let ids: Vec<_> = feed.snapshot().posts.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, ["p2", "p1"]);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_posts() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();
        let before = feed.snapshot().posts;

        api.fail_lists.store(true, Ordering::SeqCst);
        let err = feed.load().await.unwrap_err();
        assert!(matches!(err, FeedError::FetchFailed(_)));

        let snap = feed.snapshot();
        assert_eq!(snap.posts, before);
        assert!(matches!(snap.last_error, Some(FeedError::FetchFailed(_))));
        assert!(!snap.loading);

        api.fail_lists.store(false, Ordering::SeqCst);
        feed.load().await.unwrap();
        assert_eq!(feed.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn last_requested_load_wins() {
        let api = FakeApi::with_posts(Vec::new());
        let feed = controller(&api, Some(ana()));
        let first = api.script();
        let second = api.script();

        let f1 = feed.clone();
        let h1 = tokio::spawn(async move { f1.load().await });
        wait_for_calls(&api.list_calls, 1).await;

        let f2 = feed.clone();
        let h2 = tokio::spawn(async move { f2.load().await });
        wait_for_calls(&api.list_calls, 2).await;
        assert!(feed.snapshot().loading);

        second.send(Ok(vec![post("b", "newer")])).unwrap();
        h2.await.unwrap().unwrap();
        assert!(feed.snapshot().loading);

        first.send(Ok(vec![post("a", "older")])).unwrap();
        h1.await.unwrap().unwrap();

        let snap = feed.snapshot();
        assert_eq!(snap.posts.len(), 1);
        assert_eq!(snap.posts[0].id, "b");
        assert!(!snap.loading);
    }

    #[tokio::test]
    async fn superseded_failure_is_not_reported() {
        let api = FakeApi::with_posts(Vec::new());
        let feed = controller(&api, Some(ana()));
        let first = api.script();
        let second = api.script();

        let f1 = feed.clone();
        let h1 = tokio::spawn(async move { f1.load().await });
        wait_for_calls(&api.list_calls, 1).await;
        let f2 = feed.clone();
        let h2 = tokio::spawn(async move { f2.load().await });
        wait_for_calls(&api.list_calls, 2).await;

        second.send(Ok(vec![post("b", "newer")])).unwrap();
        h2.await.unwrap().unwrap();
        first.send(Err(server_error())).unwrap();
        assert!(h1.await.unwrap().is_err());

        let snap = feed.snapshot();
        assert_eq!(snap.posts[0].id, "b");
        assert_eq!(snap.last_error, None);
    }

    #[tokio::test]
    async fn blank_post_never_hits_the_network() {
        let api = FakeApi::with_posts(Vec::new());
        let feed = controller(&api, Some(ana()));

        for content in ["", "   "] {
            let err = feed.create_post(content).await.unwrap_err();
            assert!(matches!(err, FeedError::Validation(_)));
        }
        assert_eq!(FakeApi::calls(&api.create_calls), 0);
        assert_eq!(FakeApi::calls(&api.list_calls), 0);

        feed.create_post("hello").await.unwrap();
        assert_eq!(FakeApi::calls(&api.create_calls), 1);

        let snap = feed.snapshot();
        assert_eq!(snap.posts[0].content, "hello");
        assert!(!snap.creating);
        assert_eq!(snap.last_error, None);
    }

    #[tokio::test]
    async fn rapid_likes_toggle_once() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();

        let gate = api.gate_toggle();
        let f1 = feed.clone();
        let h1 = tokio::spawn(async move { f1.like("p1").await });
        wait_for_calls(&api.toggle_calls, 1).await;
        assert!(feed.snapshot().is_liking("p1"));

        for _ in 0..3 {
            assert_eq!(feed.like("p1").await, Err(FeedError::AlreadyPending));
        }
        assert_eq!(FakeApi::calls(&api.toggle_calls), 1);

        gate.send(()).unwrap();
        h1.await.unwrap().unwrap();

        let snap = feed.snapshot();
        assert!(!snap.is_liking("p1"));
        let shown = snap.post("p1").unwrap();
        assert!(shown.liked_by("u1"));
        assert_eq!(shown.distinct_like_count(), 1);

        feed.like("p1").await.unwrap();
        assert_eq!(feed.snapshot().post("p1").unwrap().distinct_like_count(), 0);
    }

    #[tokio::test]
    async fn like_failure_is_scoped_to_post() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();

        let err = feed.like("missing").await.unwrap_err();
        assert!(matches!(err, FeedError::LikeFailed { ref post_id, .. } if post_id == "missing"));

        let snap = feed.snapshot();
        assert!(snap.post_error("missing").is_some());
        assert_eq!(snap.post_error("p1"), None);
        assert_eq!(snap.last_error, None);
        assert!(!snap.is_liking("missing"));
    }

    #[tokio::test]
    async fn successful_comment_clears_only_its_draft() {
        let api = FakeApi::with_posts(vec![post("p1", "first"), post("p2", "second")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();

        feed.set_draft("p1", "nice");
        feed.set_draft("p2", "half-typed");
        feed.submit_draft("p1").await.unwrap();

        let snap = feed.snapshot();
        assert_eq!(snap.draft("p1"), "");
        assert_eq!(snap.draft("p2"), "half-typed");
        assert!(!snap.is_commenting("p1"));
        let comments = &snap.post("p1").unwrap().comments;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "nice");
        assert_eq!(comments[0].author_id, "u1");
    }

    #[tokio::test]
    async fn failed_comment_keeps_draft() {
        let api = FakeApi::with_posts(vec![post("p1", "first"), post("p2", "second")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();
        api.fail_comments.store(true, Ordering::SeqCst);

        feed.set_draft("p1", "keep me");
        let err = feed.submit_draft("p1").await.unwrap_err();
        assert!(matches!(err, FeedError::CommentFailed { .. }));

        let snap = feed.snapshot();
        assert_eq!(snap.draft("p1"), "keep me");
        assert!(matches!(
            snap.post_error("p1"),
            Some(FeedError::CommentFailed { message, .. }) if message == "Failed to create comment"
        ));
        assert_eq!(snap.post_error("p2"), None);
        assert_eq!(snap.last_error, None);
        assert!(!snap.is_commenting("p1"));
    }

    #[tokio::test]
    async fn comment_requires_login_and_content() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, None);

        assert!(matches!(
            feed.add_comment("p1", "  ").await,
            Err(FeedError::Validation(_))
        ));
        assert_eq!(
            feed.add_comment("p1", "hi").await,
            Err(FeedError::NotAuthenticated)
        );
        assert_eq!(
            feed.snapshot().post_error("p1"),
            Some(&FeedError::NotAuthenticated)
        );
        assert_eq!(FakeApi::calls(&api.comment_calls), 0);
    }

    #[tokio::test]
    async fn clear_error_dismisses_banner() {
        let api = FakeApi::with_posts(Vec::new());
        api.fail_lists.store(true, Ordering::SeqCst);
        let feed = controller(&api, Some(ana()));
        let mut rx = feed.subscribe();

        let _ = feed.load().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().last_error.is_some());

        feed.clear_error();
        assert_eq!(rx.borrow_and_update().last_error, None);

        // Nothing left to clear: no new snapshot is published.
        feed.clear_error();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn failed_create_is_reported_globally() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();
        api.fail_creates.store(true, Ordering::SeqCst);

        let err = feed.create_post("hello").await.unwrap_err();
        assert_eq!(err, FeedError::CreateFailed("Failed to create post".into()));

        let snap = feed.snapshot();
        assert_eq!(snap.last_error, Some(err));
        assert!(!snap.creating);
        assert_eq!(snap.posts.len(), 1);
        // No reload after a failed create.
        assert_eq!(FakeApi::calls(&api.list_calls), 1);

        api.fail_creates.store(false, Ordering::SeqCst);
        feed.create_post("hello").await.unwrap();
        let snap = feed.snapshot();
        assert_eq!(snap.last_error, None);
        assert_eq!(snap.posts[0].content, "hello");
    }

    #[tokio::test]
    async fn pending_comment_does_not_block_other_posts() {
        let api = FakeApi::with_posts(vec![post("p1", "first"), post("p2", "second")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();

        let gate = api.gate_comment("p1");
        let f1 = feed.clone();
        let h1 = tokio::spawn(async move { f1.add_comment("p1", "slow").await });
        wait_for_calls(&api.comment_calls, 1).await;
        assert!(feed.snapshot().is_commenting("p1"));
        assert_eq!(
            feed.add_comment("p1", "again").await,
            Err(FeedError::AlreadyPending)
        );

        feed.add_comment("p2", "quick").await.unwrap();
        let snap = feed.snapshot();
        assert!(snap.is_commenting("p1"));
        assert!(!snap.is_commenting("p2"));
        assert_eq!(snap.post("p2").unwrap().comments.len(), 1);

        gate.send(()).unwrap();
        h1.await.unwrap().unwrap();
        let snap = feed.snapshot();
        assert!(!snap.is_commenting("p1"));
        assert_eq!(snap.post("p1").unwrap().comments[0].content, "slow");
        assert_eq!(FakeApi::calls(&api.comment_calls), 2);
    }

    #[tokio::test]
    async fn like_rejected_by_server_maps_to_not_authenticated() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();
        api.reject_auth.store(true, Ordering::SeqCst);

        assert_eq!(feed.like("p1").await, Err(FeedError::NotAuthenticated));
        let snap = feed.snapshot();
        assert_eq!(snap.post_error("p1"), Some(&FeedError::NotAuthenticated));
        assert!(!snap.is_liking("p1"));
        assert_eq!(snap.last_error, None);
    }

    #[tokio::test]
    async fn rejected_token_ends_the_session() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let user_json = serde_json::to_string(&ana()).unwrap();
        let storage =
            MemoryStorage::with_entries([("token", "dead"), ("user", user_json.as_str())]);
        let store = Arc::new(SessionStore::new(OfflineAuth, storage));
        assert_eq!(store.init().await, RestoreOutcome::Restored);
        let session = store.subscribe();

        let feed = FeedController::with_invalidator(Arc::clone(&api), store.subscribe(), store.clone());
        feed.load().await.unwrap();
        api.reject_auth.store(true, Ordering::SeqCst);

        feed.set_draft("p1", "hi");
        assert_eq!(feed.submit_draft("p1").await, Err(FeedError::NotAuthenticated));
        assert!(!session.borrow().is_authenticated());
        assert_eq!(store.token(), None);
        let snap = feed.snapshot();
        assert_eq!(snap.post_error("p1"), Some(&FeedError::NotAuthenticated));
        assert_eq!(snap.draft("p1"), "hi");

        assert_eq!(feed.like("p1").await, Err(FeedError::NotAuthenticated));
        assert_eq!(feed.create_post("hello").await, Err(FeedError::NotAuthenticated));
        assert_eq!(feed.snapshot().last_error, Some(FeedError::NotAuthenticated));

        // Both persisted entries are gone.
        assert_eq!(store.init().await, RestoreOutcome::Empty);
    }

    #[tokio::test]
    async fn load_prunes_state_of_vanished_posts() {
        let api = FakeApi::with_posts(vec![post("p1", "first")]);
        let feed = controller(&api, Some(ana()));
        feed.load().await.unwrap();

        assert!(feed.like("missing").await.is_err());
        assert!(feed.snapshot().post_state("missing").is_some());
        feed.set_draft("p1", "typing");

        feed.load().await.unwrap();
        let snap = feed.snapshot();
        assert_eq!(snap.post_state("missing"), None);
        assert_eq!(snap.draft("p1"), "typing");
    }
}
