use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    /// Free-form permission string set by administrators.
    pub permissions: Option<String>,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub bio: Option<String>,
    pub about: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// Fields accepted by profile create and edit. On edit, `None` leaves the
/// stored value unchanged.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub about: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl ProfileFields {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.about.is_none()
            && self.profile_picture_url.is_none()
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// A comment on a post or on a user's page. Exactly one of `post_id` and
/// `user_page_id` is set, depending on the thread it belongs to.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_page_id: Option<i64>,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// Where a comment lives. Post comments and user page comments share a
/// shape and differ only in the table and the column pointing at the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentThread {
    Post(i64),
    UserPage(i64),
}

impl CommentThread {
    pub fn table(&self) -> &'static str {
        match self {
            CommentThread::Post(_) => "comments",
            CommentThread::UserPage(_) => "user_comments",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            CommentThread::Post(_) => "post_id",
            CommentThread::UserPage(_) => "user_page_id",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            CommentThread::Post(id) | CommentThread::UserPage(id) => *id,
        }
    }
}

pub mod db_operations;
