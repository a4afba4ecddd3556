//! One function per page. Views pick the template and build its context;
//! they know nothing about HTTP beyond where to redirect.

use crate::server::{
    Result, ServerError,
    auth::AuthenticatedUser,
    forms::{CommentForm, PostForm, PostFormErrors},
    paths::{PostDetailPath, ProfilePath},
    templates::{Template, TemplateResponse},
};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use tracing::info;
use yatube_common::{
    model::{
        Id,
        comment::Comment,
        follow::{Follow, UNIQUE_FOLLOWS_CONSTRAINT},
        group::{Group, GroupMarker, GroupSlug},
        post::{Post, PostFilter, PostMarker},
        user::{User, UserHandle},
    },
    paginator::{Page, Paginator},
};
use yatube_db::Store;

/// A rendered page or a redirect after a form submission.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum ViewResponse<C> {
    Render(TemplateResponse<C>),
    Redirect(String),
}

impl<C> ViewResponse<C> {
    #[must_use]
    pub fn redirect(location: impl ToString) -> Self {
        Self::Redirect(location.to_string())
    }
}

impl<C: Serialize> IntoResponse for ViewResponse<C> {
    fn into_response(self) -> Response {
        match self {
            Self::Render(template) => template.into_response(),
            Self::Redirect(location) => Redirect::to(&location).into_response(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct IndexContext {
    pub page_obj: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct GroupListContext {
    pub group: Group,
    pub page_obj: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ProfileContext {
    pub author: User,
    pub posts_count: usize,
    pub following: bool,
    /// Logged in and looking at someone else's profile.
    pub can_follow: bool,
    pub page_obj: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostDetailContext {
    pub post: Post,
    pub posts_count: usize,
    pub comments: Vec<Comment>,
    pub is_author: bool,
    pub can_comment: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct GroupChoice {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostFormContext {
    pub form: PostForm,
    pub errors: PostFormErrors,
    pub is_edit: bool,
    pub post_id: Option<Id<PostMarker>>,
    pub groups: Vec<GroupChoice>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct FollowContext {
    pub page_obj: Page<Post>,
}

async fn page_of_posts(
    store: &dyn Store,
    paginator: Paginator,
    filter: PostFilter,
    page: Option<&str>,
) -> Result<Page<Post>> {
    let count = store.count_posts(filter).await?;
    let window = paginator.window(page, count);
    let posts = store
        .fetch_posts(filter, window.offset, window.limit)
        .await?;

    Ok(window.into_page(posts))
}

async fn author_by_handle(store: &dyn Store, handle: &UserHandle) -> Result<User> {
    store
        .fetch_user_by_handle(handle)
        .await?
        .ok_or_else(|| ServerError::UserByHandleNotFound(handle.clone()))
}

async fn post_by_id(store: &dyn Store, post_id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))
}

fn post_form(
    form: PostForm,
    errors: PostFormErrors,
    post_id: Option<Id<PostMarker>>,
    groups: &[Group],
) -> TemplateResponse<PostFormContext> {
    let groups = groups
        .iter()
        .map(|group| GroupChoice {
            id: group.id,
            title: group.title.clone(),
            selected: form.group == group.id.to_string(),
        })
        .collect();

    TemplateResponse::new(
        Template::CreatePost,
        PostFormContext {
            form,
            errors,
            is_edit: post_id.is_some(),
            post_id,
            groups,
        },
    )
}

pub async fn index(
    store: &dyn Store,
    paginator: Paginator,
    page: Option<&str>,
) -> Result<TemplateResponse<IndexContext>> {
    let page_obj = page_of_posts(store, paginator, PostFilter::All, page).await?;

    Ok(TemplateResponse::new(
        Template::Index,
        IndexContext { page_obj },
    ))
}

pub async fn group_list(
    store: &dyn Store,
    paginator: Paginator,
    slug: &GroupSlug,
    page: Option<&str>,
) -> Result<TemplateResponse<GroupListContext>> {
    let group = store
        .fetch_group_by_slug(slug)
        .await?
        .ok_or_else(|| ServerError::GroupBySlugNotFound(slug.clone()))?;
    let page_obj = page_of_posts(store, paginator, PostFilter::Group(group.id), page).await?;

    Ok(TemplateResponse::new(
        Template::GroupList,
        GroupListContext { group, page_obj },
    ))
}

pub async fn profile(
    store: &dyn Store,
    paginator: Paginator,
    viewer: Option<&AuthenticatedUser>,
    username: &UserHandle,
    page: Option<&str>,
) -> Result<TemplateResponse<ProfileContext>> {
    let author = author_by_handle(store, username).await?;
    let page_obj = page_of_posts(store, paginator, PostFilter::Author(author.id), page).await?;

    let (following, can_follow) = match viewer {
        Some(viewer) if viewer.user_id() != author.id => {
            let follow = Follow {
                user: viewer.user_id(),
                author: author.id,
            };
            (store.is_following(follow).await?, true)
        }
        _ => (false, false),
    };

    Ok(TemplateResponse::new(
        Template::Profile,
        ProfileContext {
            posts_count: page_obj.count,
            author,
            following,
            can_follow,
            page_obj,
        },
    ))
}

pub async fn post_detail(
    store: &dyn Store,
    viewer: Option<&AuthenticatedUser>,
    post_id: Id<PostMarker>,
) -> Result<TemplateResponse<PostDetailContext>> {
    let post = post_by_id(store, post_id).await?;
    let posts_count = store
        .count_posts(PostFilter::Author(post.author.id))
        .await?;
    let comments = store.fetch_comments(post_id).await?;

    Ok(TemplateResponse::new(
        Template::PostDetail,
        PostDetailContext {
            is_author: viewer.is_some_and(|viewer| viewer.user_id() == post.author.id),
            can_comment: viewer.is_some(),
            post,
            posts_count,
            comments,
        },
    ))
}

pub async fn post_create_form(store: &dyn Store) -> Result<TemplateResponse<PostFormContext>> {
    let groups = store.fetch_groups().await?;

    Ok(post_form(
        PostForm::default(),
        PostFormErrors::default(),
        None,
        &groups,
    ))
}

/// Saves a valid submission and redirects to the author's profile.
pub async fn post_create(
    store: &dyn Store,
    user: &AuthenticatedUser,
    form: PostForm,
) -> Result<ViewResponse<PostFormContext>> {
    let groups = store.fetch_groups().await?;
    let content = match form.validate(&groups) {
        Ok(content) => content,
        Err(errors) => return Ok(ViewResponse::Render(post_form(form, errors, None, &groups))),
    };

    let post = store.create_post(user.user_id(), &content).await?;
    info!(post_id = %post.id, author = %user.user().handle, "Created post");

    Ok(ViewResponse::redirect(ProfilePath {
        username: user.user().handle.clone(),
    }))
}

/// Only the author may edit; everyone else is sent to the post itself.
pub async fn post_edit_form(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
) -> Result<ViewResponse<PostFormContext>> {
    let post = post_by_id(store, post_id).await?;
    if post.author.id != user.user_id() {
        return Ok(ViewResponse::redirect(PostDetailPath { post_id }));
    }

    let groups = store.fetch_groups().await?;

    Ok(ViewResponse::Render(post_form(
        PostForm::from_post(&post),
        PostFormErrors::default(),
        Some(post_id),
        &groups,
    )))
}

pub async fn post_edit(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
    form: PostForm,
) -> Result<ViewResponse<PostFormContext>> {
    let post = post_by_id(store, post_id).await?;
    if post.author.id != user.user_id() {
        return Ok(ViewResponse::redirect(PostDetailPath { post_id }));
    }

    let groups = store.fetch_groups().await?;
    let content = match form.validate(&groups) {
        Ok(content) => content,
        Err(errors) => {
            return Ok(ViewResponse::Render(post_form(
                form,
                errors,
                Some(post_id),
                &groups,
            )));
        }
    };

    store
        .update_post(post_id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;
    info!(%post_id, "Edited post");

    Ok(ViewResponse::redirect(PostDetailPath { post_id }))
}

pub async fn post_delete(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
) -> Result<ViewResponse<()>> {
    let post = post_by_id(store, post_id).await?;
    if post.author.id != user.user_id() {
        return Ok(ViewResponse::redirect(PostDetailPath { post_id }));
    }

    store.delete_post(post_id).await?;
    info!(%post_id, "Deleted post");

    Ok(ViewResponse::redirect(ProfilePath {
        username: post.author.handle,
    }))
}

/// Blank comments are dropped silently; either way the post is shown again.
pub async fn add_comment(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
    form: &CommentForm,
) -> Result<ViewResponse<()>> {
    post_by_id(store, post_id).await?;

    if let Some(text) = form.validate() {
        let comment = store.create_comment(post_id, user.user_id(), &text).await?;
        info!(%post_id, comment_id = %comment.id, "Added comment");
    }

    Ok(ViewResponse::redirect(PostDetailPath { post_id }))
}

pub async fn follow_index(
    store: &dyn Store,
    paginator: Paginator,
    user: &AuthenticatedUser,
    page: Option<&str>,
) -> Result<TemplateResponse<FollowContext>> {
    let page_obj =
        page_of_posts(store, paginator, PostFilter::FollowedBy(user.user_id()), page).await?;

    Ok(TemplateResponse::new(
        Template::Follow,
        FollowContext { page_obj },
    ))
}

/// Following twice is a no-op. Following yourself is ignored.
pub async fn profile_follow(
    store: &dyn Store,
    user: &AuthenticatedUser,
    username: &UserHandle,
) -> Result<ViewResponse<()>> {
    let author = author_by_handle(store, username).await?;
    let follow = Follow {
        user: user.user_id(),
        author: author.id,
    };

    if !follow.is_self_follow() {
        match store.create_follow(follow).await {
            Ok(()) => info!(user = %user.user().handle, author = %author.handle, "Followed"),
            Err(err) if err.is_unique_violation(UNIQUE_FOLLOWS_CONSTRAINT) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(ViewResponse::redirect(ProfilePath {
        username: author.handle,
    }))
}

pub async fn profile_unfollow(
    store: &dyn Store,
    user: &AuthenticatedUser,
    username: &UserHandle,
) -> Result<ViewResponse<()>> {
    let author = author_by_handle(store, username).await?;
    let follow = Follow {
        user: user.user_id(),
        author: author.id,
    };

    if store.delete_follow(follow).await? {
        info!(user = %user.user().handle, author = %author.handle, "Unfollowed");
    }

    Ok(ViewResponse::redirect(ProfilePath {
        username: author.handle,
    }))
}
