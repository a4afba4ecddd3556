//! Every route of the site. The `Display` impls of these paths produce the
//! URLs redirects point to.

use crate::server::ServerError;
use axum_extra::routing::TypedPath;
use serde::Deserialize;
use yatube_common::model::{Id, group::GroupSlug, post::PostMarker, user::UserHandle};

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
pub struct IndexPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
pub struct GroupListPath {
    pub slug: GroupSlug,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub struct ProfilePath {
    pub username: UserHandle,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/", rejection(ServerError))]
pub struct PostDetailPath {
    pub post_id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
pub struct PostCreatePath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/edit/", rejection(ServerError))]
pub struct PostEditPath {
    pub post_id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/delete/", rejection(ServerError))]
pub struct PostDeletePath {
    pub post_id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comment/", rejection(ServerError))]
pub struct AddCommentPath {
    pub post_id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
pub struct FollowIndexPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
pub struct ProfileFollowPath {
    pub username: UserHandle,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
pub struct ProfileUnfollowPath {
    pub username: UserHandle,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
pub struct SignupPath();
