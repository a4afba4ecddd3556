//! Submitted HTML forms and their validation.
//!
//! Forms keep the raw submitted strings so an invalid submission can be shown
//! again exactly as typed, next to its field errors.

use serde::{Deserialize, Serialize};
use yatube_common::model::{
    Id,
    group::Group,
    post::{Post, PostContent, PostText},
};

const REQUIRED: &str = "Обязательное поле.";
const INVALID_CHOICE: &str = "Выберите корректный вариант.";
const INVALID_IMAGE: &str = "Укажите путь к изображению.";

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostFormErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
    pub image: Option<&'static str>,
}

impl PostFormErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

impl PostForm {
    /// The form pre-filled with an existing post.
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.get().to_owned(),
            group: post
                .group
                .as_ref()
                .map(|group| group.id.to_string())
                .unwrap_or_default(),
            image: post.image.clone().unwrap_or_default(),
        }
    }

    /// Checks the submission against the groups that can be picked.
    pub fn validate(&self, groups: &[Group]) -> Result<PostContent, PostFormErrors> {
        let mut errors = PostFormErrors::default();

        let text = PostText::new(self.text.clone())
            .inspect_err(|_| errors.text = Some(REQUIRED))
            .ok();

        let group = match self.group.trim() {
            "" => None,
            raw => {
                let group = raw
                    .parse::<u64>()
                    .ok()
                    .map(Id::from)
                    .filter(|id| groups.iter().any(|group| group.id == *id));
                if group.is_none() {
                    errors.group = Some(INVALID_CHOICE);
                }
                group
            }
        };

        let image = match self.image.trim() {
            "" => None,
            path if path.contains("..") || path.starts_with('/') => {
                errors.image = Some(INVALID_IMAGE);
                None
            }
            path => Some(path.to_owned()),
        };

        match text {
            Some(text) if errors.is_empty() => Ok(PostContent { text, group, image }),
            _ => Err(errors),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    #[must_use]
    pub fn validate(&self) -> Option<PostText> {
        PostText::new(self.text.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::forms::{CommentForm, PostForm};
    use yatube_common::model::{
        Id,
        group::{Group, GroupSlug},
    };

    fn groups() -> Vec<Group> {
        vec![Group {
            id: Id::from(7_u64),
            title: "Коты".to_owned(),
            slug: GroupSlug::new("cats".to_owned()).unwrap(),
            description: String::new(),
        }]
    }

    #[test]
    fn valid_submission() {
        let form = PostForm {
            text: "Тестовый пост".to_owned(),
            group: "7".to_owned(),
            image: "posts/cat.gif".to_owned(),
        };

        let content = form.validate(&groups()).unwrap();

        assert_eq!(content.text.get(), "Тестовый пост");
        assert_eq!(content.group, Some(Id::from(7_u64)));
        assert_eq!(content.image.as_deref(), Some("posts/cat.gif"));
    }

    #[test]
    fn empty_optional_fields() {
        let form = PostForm {
            text: "Тестовый пост".to_owned(),
            ..PostForm::default()
        };

        let content = form.validate(&groups()).unwrap();

        assert_eq!(content.group, None);
        assert_eq!(content.image, None);
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let form = PostForm {
            text: "   ".to_owned(),
            group: "8".to_owned(),
            image: "../../etc/passwd".to_owned(),
        };

        let errors = form.validate(&groups()).unwrap_err();

        assert!(errors.text.is_some());
        assert!(errors.group.is_some());
        assert!(errors.image.is_some());
    }

    #[test]
    fn unparsable_group_is_rejected() {
        let form = PostForm {
            text: "Тестовый пост".to_owned(),
            group: "cats".to_owned(),
            image: String::new(),
        };

        let errors = form.validate(&groups()).unwrap_err();

        assert!(errors.text.is_none());
        assert!(errors.group.is_some());
    }

    #[test]
    fn blank_comment() {
        assert!(
            CommentForm {
                text: "\n".to_owned()
            }
            .validate()
            .is_none()
        );
        assert!(
            CommentForm {
                text: "Комментарий".to_owned()
            }
            .validate()
            .is_some()
        );
    }
}
