use crate::server::ServerRouter;
use axum::Router;

mod posts;
mod users;

pub fn routes() -> ServerRouter {
    Router::new().merge(posts::routes()).merge(users::routes())
}

#[cfg(test)]
mod tests {
    use crate::server::{self, ServerState, cache::PageCache};
    use axum::{
        Router,
        body::Body,
        http::{
            Method, Request, StatusCode,
            header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
        },
        response::Response,
    };
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };
    use tokio::sync::oneshot;
    use tower::ServiceExt;
    use yatube_common::{
        model::{
            Id,
            auth::{AuthToken, Authentication, TokenDigest},
            comment::Comment,
            follow::Follow,
            group::{CreateGroup, Group, GroupMarker, GroupSlug},
            post::{Post, PostContent, PostFilter, PostMarker, PostText},
            user::{CreateUser, User, UserHandle, UserMarker},
        },
        paginator::Paginator,
        util::PositiveDuration,
    };
    use yatube_db::{MemoryStore, Result, Store};

    struct TestApp {
        store: Arc<dyn Store>,
        index_cache: PageCache,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_store(Arc::new(MemoryStore::default()))
        }

        fn with_store(store: Arc<dyn Store>) -> Self {
            let index_cache = PageCache::new(Duration::from_secs(20));
            let state = ServerState {
                store: Arc::clone(&store),
                paginator: Paginator::default(),
                index_cache: index_cache.clone(),
            };

            Self {
                store,
                index_cache,
                router: server::routes().with_state(state),
            }
        }

        async fn user(&self, handle: &str) -> (User, String) {
            let user = self
                .store
                .create_user(&CreateUser {
                    handle: UserHandle::new(handle.to_owned()).unwrap(),
                })
                .await
                .unwrap();
            let token = AuthToken::issue(user.id);
            self.store
                .create_auth(user.id, &token.digest().unwrap(), None)
                .await
                .unwrap();

            (user, format!("Bearer {}", token.encode()))
        }

        async fn group(&self, slug: &str) -> Group {
            self.store
                .create_group(&CreateGroup {
                    title: format!("Группа {slug}"),
                    slug: GroupSlug::new(slug.to_owned()).unwrap(),
                    description: String::new(),
                })
                .await
                .unwrap()
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            authorization: Option<&str>,
            form: Option<&str>,
        ) -> Response {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(authorization) = authorization {
                request = request.header(AUTHORIZATION, authorization);
            }
            let body = match form {
                Some(form) => {
                    request = request.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                    Body::from(form.to_owned())
                }
                None => Body::empty(),
            };

            self.router
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap()
        }

        async fn get(&self, uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
            let response = self.send(Method::GET, uri, authorization, None).await;
            let status = response.status();
            let body = response.into_body().collect().await.unwrap().to_bytes();

            (status, String::from_utf8(body.to_vec()).unwrap())
        }

        async fn post(&self, uri: &str, authorization: &str, form: &str) -> (StatusCode, String) {
            let response = self
                .send(Method::POST, uri, Some(authorization), Some(form))
                .await;
            let location = response
                .headers()
                .get(LOCATION)
                .map(|location| location.to_str().unwrap().to_owned())
                .unwrap_or_default();

            (response.status(), location)
        }
    }

    /// Parks the next `fetch_posts` call after it has read, until resumed.
    struct Pause {
        reached: oneshot::Sender<()>,
        resume: oneshot::Receiver<()>,
    }

    #[derive(Debug, Default)]
    struct PausingStore {
        inner: MemoryStore,
        pause: Mutex<Option<Pause>>,
    }

    impl std::fmt::Debug for Pause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("Pause")
        }
    }

    impl PausingStore {
        /// Returns the signal that a read is parked and the handle resuming it.
        fn pause_next_read(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (reached, reached_rx) = oneshot::channel();
            let (resume_tx, resume) = oneshot::channel();
            *self.pause.lock().unwrap() = Some(Pause { reached, resume });

            (reached_rx, resume_tx)
        }
    }

    #[async_trait]
    impl Store for PausingStore {
        async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
            self.inner.fetch_user(user_id).await
        }

        async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
            self.inner.fetch_user_by_handle(handle).await
        }

        async fn create_user(&self, user: &CreateUser) -> Result<User> {
            self.inner.create_user(user).await
        }

        async fn create_auth(
            &self,
            user_id: Id<UserMarker>,
            digest: &TokenDigest,
            expires_after: Option<PositiveDuration>,
        ) -> Result<()> {
            self.inner.create_auth(user_id, digest, expires_after).await
        }

        async fn fetch_auth(&self, digest: &TokenDigest) -> Result<Option<Authentication>> {
            self.inner.fetch_auth(digest).await
        }

        async fn fetch_groups(&self) -> Result<Vec<Group>> {
            self.inner.fetch_groups().await
        }

        async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
            self.inner.fetch_group(group_id).await
        }

        async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
            self.inner.fetch_group_by_slug(slug).await
        }

        async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
            self.inner.create_group(group).await
        }

        async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
            self.inner.fetch_post(post_id).await
        }

        async fn count_posts(&self, filter: PostFilter) -> Result<usize> {
            self.inner.count_posts(filter).await
        }

        async fn fetch_posts(
            &self,
            filter: PostFilter,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<Post>> {
            let posts = self.inner.fetch_posts(filter, offset, limit).await?;

            let pause = self.pause.lock().unwrap().take();
            if let Some(Pause { reached, resume }) = pause {
                reached.send(()).unwrap();
                resume.await.unwrap();
            }

            Ok(posts)
        }

        async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
            self.inner.create_post(author, content).await
        }

        async fn update_post(
            &self,
            post_id: Id<PostMarker>,
            content: &PostContent,
        ) -> Result<Option<Post>> {
            self.inner.update_post(post_id, content).await
        }

        async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
            self.inner.delete_post(post_id).await
        }

        async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
            self.inner.fetch_comments(post_id).await
        }

        async fn create_comment(
            &self,
            post_id: Id<PostMarker>,
            author: Id<UserMarker>,
            text: &PostText,
        ) -> Result<Comment> {
            self.inner.create_comment(post_id, author, text).await
        }

        async fn create_follow(&self, follow: Follow) -> Result<()> {
            self.inner.create_follow(follow).await
        }

        async fn delete_follow(&self, follow: Follow) -> Result<bool> {
            self.inner.delete_follow(follow).await
        }

        async fn is_following(&self, follow: Follow) -> Result<bool> {
            self.inner.is_following(follow).await
        }
    }

    #[tokio::test]
    async fn public_pages_are_reachable() {
        let app = TestApp::new();
        let (author, _) = app.user("auth").await;
        let group = app.group("test-slug").await;
        let post = app
            .store
            .create_post(
                author.id,
                &PostContent {
                    text: PostText::new("Тестовый пост".to_owned()).unwrap(),
                    group: Some(group.id),
                    image: None,
                },
            )
            .await
            .unwrap();

        for uri in [
            "/".to_owned(),
            "/group/test-slug/".to_owned(),
            "/profile/auth/".to_owned(),
            format!("/posts/{}/", post.id),
        ] {
            let (status, body) = app.get(&uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body.contains("Тестовый пост"), "{uri}");
        }
    }

    #[tokio::test]
    async fn missing_pages_render_the_404_template() {
        let app = TestApp::new();

        for uri in [
            "/unexisting_page/",
            "/group/nope/",
            "/profile/nobody/",
            "/posts/1/",
            "/posts/not-a-number/",
        ] {
            let (status, body) = app.get(uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body.contains("Custom 404"), "{uri}");
        }
    }

    #[tokio::test]
    async fn login_only_pages_reject_anonymous_users() {
        let app = TestApp::new();

        for uri in ["/create/", "/follow/"] {
            let (status, _) = app.get(uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }

        let response = app
            .send(Method::POST, "/create/", None, Some("text=hi"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn new_posts_show_up_on_the_cached_index() {
        let app = TestApp::new();
        let (author, token) = app.user("auth").await;

        let (_, body) = app.get("/", None).await;
        assert!(!body.contains("Первый пост"));

        app.store
            .create_post(
                author.id,
                &PostContent {
                    text: PostText::new("Мимо кеша".to_owned()).unwrap(),
                    group: None,
                    image: None,
                },
            )
            .await
            .unwrap();
        let (_, body) = app.get("/", None).await;
        assert!(!body.contains("Мимо кеша"), "index was not cached");

        // "Первый пост", urlencoded.
        let form = "text=%D0%9F%D0%B5%D1%80%D0%B2%D1%8B%D0%B9+%D0%BF%D0%BE%D1%81%D1%82&group=&image=";
        let (status, location) = app.post("/create/", &token, form).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location, "/profile/auth/");

        let (_, body) = app.get("/", None).await;
        assert!(body.contains("Первый пост"));
        assert!(body.contains("Мимо кеша"));
    }

    #[tokio::test]
    async fn index_read_during_a_write_is_not_cached() {
        let store = Arc::new(PausingStore::default());
        let app = TestApp::with_store(Arc::clone(&store) as Arc<dyn Store>);
        let (_, token) = app.user("auth").await;

        let (reached, resume) = store.pause_next_read();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let racing_read = tokio::spawn(app.router.clone().oneshot(request));
        reached.await.unwrap();

        let (status, _) = app.post("/create/", &token, "text=fresh-post").await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        resume.send(()).unwrap();
        let response = racing_read.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, body) = app.get("/", None).await;
        assert!(body.contains("fresh-post"), "index served a page read before the write");
    }

    #[tokio::test]
    async fn only_post_writes_invalidate_the_index() {
        let app = TestApp::new();
        let (_, token) = app.user("auth").await;

        app.post("/create/", &token, "text=commented").await;
        let generation = app.index_cache.generation();
        let post = app
            .store
            .fetch_posts(PostFilter::All, 0, 1)
            .await
            .unwrap()
            .remove(0);

        let (status, _) = app
            .post(&format!("/posts/{}/comment/", post.id), &token, "text=nice")
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        app.post("/profile/auth/follow/", &token, "").await;
        assert_eq!(app.index_cache.generation(), generation);

        app.post(&format!("/posts/{}/delete/", post.id), &token, "")
            .await;
        assert_ne!(app.index_cache.generation(), generation);
    }

    #[tokio::test]
    async fn public_pages_ignore_rejected_tokens() {
        let app = TestApp::new();
        let (_, token) = app.user("auth").await;
        app.post("/create/", &token, "text=public").await;
        let stale = format!("Bearer {}", AuthToken::issue(Id::from(1_u64)).encode());

        for authorization in [stale.as_str(), "Bearer nope"] {
            let (status, body) = app.get("/profile/auth/", Some(authorization)).await;
            assert_eq!(status, StatusCode::OK, "{authorization}");
            assert!(body.contains("public"));

            let (status, _) = app.get("/create/", Some(authorization)).await;
            assert!(status.is_client_error(), "{authorization}");
        }
    }

    #[tokio::test]
    async fn invalid_forms_are_shown_again() {
        let app = TestApp::new();
        let (_, token) = app.user("auth").await;

        let response = app
            .send(Method::POST, "/create/", Some(&token), Some("text=++&group=123"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Обязательное поле."));
        assert!(body.contains("Выберите корректный вариант."));
    }

    #[tokio::test]
    async fn strangers_cannot_edit() {
        let app = TestApp::new();
        let (_, author_token) = app.user("auth").await;
        let (_, stranger_token) = app.user("stranger").await;

        app.post("/create/", &author_token, "text=original").await;
        let (_, body) = app.get("/profile/auth/", None).await;
        assert!(body.contains("original"));
        let post = app
            .store
            .fetch_posts(PostFilter::All, 0, 1)
            .await
            .unwrap()
            .remove(0);
        let edit = format!("/posts/{}/edit/", post.id);
        let detail = format!("/posts/{}/", post.id);

        let response = app.send(Method::GET, &edit, Some(&stranger_token), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let (status, location) = app.post(&edit, &stranger_token, "text=forged").await;
        assert_eq!((status, location.as_str()), (StatusCode::SEE_OTHER, detail.as_str()));

        let (status, _) = app.get(&edit, Some(&author_token)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.get(&detail, None).await;
        assert!(body.contains("original"));
        assert!(!body.contains("forged"));
    }

    #[tokio::test]
    async fn follow_feed_follows_subscriptions() {
        let app = TestApp::new();
        let (_, author_token) = app.user("auth").await;
        let (_, reader_token) = app.user("reader").await;
        app.post("/create/", &author_token, "text=subscribed+content").await;

        for _ in 0..2 {
            let (status, location) = app
                .post("/profile/auth/follow/", &reader_token, "")
                .await;
            assert_eq!(status, StatusCode::SEE_OTHER);
            assert_eq!(location, "/profile/auth/");
        }
        let (status, body) = app.get("/follow/", Some(&reader_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("subscribed content"));
        let (_, body) = app.get("/follow/", Some(&author_token)).await;
        assert!(!body.contains("subscribed content"));

        app.post("/profile/auth/unfollow/", &reader_token, "").await;
        let (_, body) = app.get("/follow/", Some(&reader_token)).await;
        assert!(!body.contains("subscribed content"));
    }

    #[tokio::test]
    async fn signup_hands_out_a_working_token() {
        let app = TestApp::new();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/signup/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"handle":"newbie"}"#))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["user"]["handle"], "newbie");
        let token = format!("Bearer {}", body["token"].as_str().unwrap());

        let (status, _) = app.get("/create/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/signup/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"handle":"newbie"}"#))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
