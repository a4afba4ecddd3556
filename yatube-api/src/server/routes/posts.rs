use crate::server::{
    Result, ServerRouter,
    auth::AuthenticatedUser,
    cache::PageCache,
    extract::{Form, PageQuery, Query},
    forms::{CommentForm, PostForm},
    paths::{
        AddCommentPath, FollowIndexPath, GroupListPath, IndexPath, PostCreatePath, PostDeletePath,
        PostDetailPath, PostEditPath, ProfileFollowPath, ProfilePath, ProfileUnfollowPath,
    },
    templates::TemplateResponse,
    views::{
        self, FollowContext, GroupListContext, PostDetailContext, PostFormContext,
        ProfileContext, ViewResponse,
    },
};
use axum::{extract::State, response::Html};
use axum_extra::routing::RouterExt;
use std::sync::Arc;
use yatube_common::paginator::Paginator;
use yatube_db::Store;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(group_list)
        .typed_get(profile)
        .typed_get(post_detail)
        .typed_get(post_create_form)
        .typed_post(post_create)
        .typed_get(post_edit_form)
        .typed_post(post_edit)
        .typed_post(post_delete)
        .typed_post(add_comment)
        .typed_get(follow_index)
        .typed_post(profile_follow)
        .typed_post(profile_unfollow)
}

/// Served from [`PageCache`] while fresh.
async fn index(
    IndexPath(): IndexPath,
    State(db): State<Arc<dyn Store>>,
    State(paginator): State<Paginator>,
    State(cache): State<PageCache>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>> {
    if let Some(html) = cache.get(query.page()).await {
        return Ok(Html(html));
    }

    let generation = cache.generation();
    let html = views::index(&*db, paginator, query.page()).await?.render()?;
    cache.insert(generation, query.page(), html.clone()).await;

    Ok(Html(html))
}

async fn group_list(
    GroupListPath { slug }: GroupListPath,
    State(db): State<Arc<dyn Store>>,
    State(paginator): State<Paginator>,
    Query(query): Query<PageQuery>,
) -> Result<TemplateResponse<GroupListContext>> {
    views::group_list(&*db, paginator, &slug, query.page()).await
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<dyn Store>>,
    State(paginator): State<Paginator>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> Result<TemplateResponse<ProfileContext>> {
    views::profile(&*db, paginator, viewer.as_ref(), &username, query.page()).await
}

async fn post_detail(
    PostDetailPath { post_id }: PostDetailPath,
    State(db): State<Arc<dyn Store>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<TemplateResponse<PostDetailContext>> {
    views::post_detail(&*db, viewer.as_ref(), post_id).await
}

async fn post_create_form(
    PostCreatePath(): PostCreatePath,
    State(db): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<TemplateResponse<PostFormContext>> {
    views::post_create_form(&*db).await
}

async fn post_create(
    PostCreatePath(): PostCreatePath,
    State(db): State<Arc<dyn Store>>,
    State(cache): State<PageCache>,
    user: AuthenticatedUser,
    Form(form): Form<PostForm>,
) -> Result<ViewResponse<PostFormContext>> {
    let response = views::post_create(&*db, &user, form).await?;
    cache.invalidate();

    Ok(response)
}

async fn post_edit_form(
    PostEditPath { post_id }: PostEditPath,
    State(db): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<ViewResponse<PostFormContext>> {
    views::post_edit_form(&*db, &user, post_id).await
}

async fn post_edit(
    PostEditPath { post_id }: PostEditPath,
    State(db): State<Arc<dyn Store>>,
    State(cache): State<PageCache>,
    user: AuthenticatedUser,
    Form(form): Form<PostForm>,
) -> Result<ViewResponse<PostFormContext>> {
    let response = views::post_edit(&*db, &user, post_id, form).await?;
    cache.invalidate();

    Ok(response)
}

async fn post_delete(
    PostDeletePath { post_id }: PostDeletePath,
    State(db): State<Arc<dyn Store>>,
    State(cache): State<PageCache>,
    user: AuthenticatedUser,
) -> Result<ViewResponse<()>> {
    let response = views::post_delete(&*db, &user, post_id).await?;
    cache.invalidate();

    Ok(response)
}

/// The index does not show comments, so the cache stays.
async fn add_comment(
    AddCommentPath { post_id }: AddCommentPath,
    State(db): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Form(form): Form<CommentForm>,
) -> Result<ViewResponse<()>> {
    views::add_comment(&*db, &user, post_id, &form).await
}

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(db): State<Arc<dyn Store>>,
    State(paginator): State<Paginator>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<TemplateResponse<FollowContext>> {
    views::follow_index(&*db, paginator, &user, query.page()).await
}

async fn profile_follow(
    ProfileFollowPath { username }: ProfileFollowPath,
    State(db): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<ViewResponse<()>> {
    views::profile_follow(&*db, &user, &username).await
}

async fn profile_unfollow(
    ProfileUnfollowPath { username }: ProfileUnfollowPath,
    State(db): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<ViewResponse<()>> {
    views::profile_unfollow(&*db, &user, &username).await
}
