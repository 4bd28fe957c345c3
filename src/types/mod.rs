//! Typed marketplace records.
//!
//! Everything the backend returns is decoded into these types at the fetch
//! boundary, so cached values are always well-formed. Timestamps are kept
//! as the RFC 3339 strings the backend sends.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Page size used when none is given, matching the backend default.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Largest page size the backend honors.
pub const MAX_PAGE_SIZE: u32 = 100;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of an uploaded model.
    ModelId
);
string_id!(
    /// Identifier of a user account.
    UserId
);

/// Treats `null` and a missing field as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// `true` for admins and super admins.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

/// Moderation state of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Whether an edit to an already-approved model awaits review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    #[default]
    Idle,
    PendingReview,
}

/// Public view of a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_banned: bool,
    pub created_at: String,
}

/// Edits to an approved model that are waiting for moderation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingModelChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// An uploaded model as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub status: ModelStatus,
    #[serde(default)]
    pub update_status: UpdateStatus,
    #[serde(default)]
    pub pending_changes: Option<PendingModelChanges>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Uploader, when the backend joins it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Payload of the model detail route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetail {
    pub model: Model,
    /// Only reported for authenticated requests; `false` otherwise.
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub favorite_count: u64,
}

/// A user's bookmark of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub user_id: UserId,
    pub model_id: ModelId,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
}

/// A site-wide notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: String,
}

/// Where to fetch a model's file after a download was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTicket {
    pub file_path: String,
    pub file_name: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// `true` if a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pagination and search parameters of a list request.
///
/// Also the cache key of a list page: two queries hit the same entry only if
/// page, page size and search term all match.
///
/// # Examples
///
/// ```
/// use hubcache::types::PageQuery;
///
/// let query = PageQuery::new(2, 24).search("  low poly  ");
/// assert_eq!(query.search_term(), Some("low poly"));
/// assert_eq!(query.to_query_string(), "page=2&page_size=24&search=low%20poly");
///
/// // Blank search terms are the same as no search.
/// assert_eq!(PageQuery::first().search("   "), PageQuery::first());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageQuery {
    page: u32,
    page_size: u32,
    search: Option<String>,
}

impl PageQuery {
    /// Page numbers below 1 are raised to 1; page sizes outside
    /// `1..=MAX_PAGE_SIZE` fall back to [`DEFAULT_PAGE_SIZE`].
    pub fn new(page: u32, page_size: u32) -> Self {
        let page_size = if (1..=MAX_PAGE_SIZE).contains(&page_size) {
            page_size
        } else {
            DEFAULT_PAGE_SIZE
        };
        Self {
            page: page.max(1),
            page_size,
            search: None,
        }
    }

    /// The first page at the default size with no search.
    pub fn first() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }

    /// Sets the search term. Surrounding whitespace is trimmed and a blank
    /// term clears the search.
    #[must_use]
    pub fn search(mut self, term: impl AsRef<str>) -> Self {
        let term = term.as_ref().trim();
        self.search = (!term.is_empty()).then(|| term.to_owned());
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Encodes the query as `page=..&page_size=..[&search=..]`.
    pub fn to_query_string(&self) -> String {
        let mut query = format!("page={}&page_size={}", self.page, self.page_size);
        if let Some(term) = &self.search {
            query.push_str("&search=");
            query.push_str(&urlencoding::encode(term));
        }
        query
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::first()
    }
}

/// Body of a create-model request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewModel {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Body of an update-model request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl ModelUpdate {
    /// `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The backend's response envelope.
///
/// `code == 0` means success; any other code carries an error `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn model_json() -> serde_json::Value {
        json!({
            "id": "m-1",
            "user_id": "u-1",
            "title": "Spaceship",
            "description": null,
            "file_path": "models/ship.glb",
            "file_size": 2048,
            "image_url": null,
            "tags": null,
            "is_public": true,
            "status": "approved",
            "update_status": "pending_review",
            "pending_changes": {"title": "Spaceship v2"},
            "downloads": 3,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z",
            "user": {
                "id": "u-1",
                "username": "ada",
                "avatar_url": null,
                "bio": null,
                "role": "super_admin",
                "created_at": "2024-12-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn model_decodes_with_nulls_and_nested_user() {
        let model: Model = serde_json::from_value(model_json()).unwrap();
        assert_eq!(model.id, ModelId::from("m-1"));
        assert!(model.tags.is_empty());
        assert_eq!(model.status, ModelStatus::Approved);
        assert_eq!(model.update_status, UpdateStatus::PendingReview);
        assert_eq!(
            model.pending_changes.unwrap().title.as_deref(),
            Some("Spaceship v2")
        );
        let user = model.user.unwrap();
        assert!(user.role.is_admin());
        assert_eq!(user.email, None);
    }

    #[test]
    fn model_defaults_for_missing_optional_fields() {
        let model: Model = serde_json::from_value(json!({
            "id": "m-2",
            "user_id": "u-2",
            "title": "Tree",
            "file_path": "tree.obj",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(model.status, ModelStatus::Pending);
        assert_eq!(model.update_status, UpdateStatus::Idle);
        assert_eq!(model.downloads, 0);
        assert!(model.user.is_none());
    }

    #[test]
    fn model_rejects_wrong_shape() {
        let err = serde_json::from_value::<Model>(json!({"id": 5})).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn detail_without_login_fields() {
        let detail: ModelDetail =
            serde_json::from_value(json!({"model": model_json(), "favorite_count": 9})).unwrap();
        assert!(!detail.is_favorited);
        assert_eq!(detail.favorite_count, 9);
    }

    #[test]
    fn page_with_null_items() {
        let page: Page<Announcement> = serde_json::from_value(json!({
            "items": null, "total": 0, "page": 1, "page_size": 12, "total_pages": 0
        }))
        .unwrap();
        assert!(page.is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn envelope_without_data() {
        let resp: ApiResponse<Model> =
            serde_json::from_value(json!({"code": 404, "message": "model not found"})).unwrap();
        assert!(!resp.is_success());
        assert!(resp.data.is_none());
    }

    #[test]
    fn page_query_normalizes_bounds() {
        let query = PageQuery::new(0, 500);
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(query, PageQuery::first());
        assert_eq!(PageQuery::default(), PageQuery::first());
    }

    #[test]
    fn page_query_escapes_search() {
        let query = PageQuery::first().search("a&b=c");
        assert_eq!(query.to_query_string(), "page=1&page_size=12&search=a%26b%3Dc");
        assert_eq!(query.search_term(), Some("a&b=c"));
    }

    #[test]
    fn model_update_skips_absent_fields() {
        let update = ModelUpdate {
            title: Some("New".into()),
            ..ModelUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"title": "New"}));
        assert!(!update.is_empty());
        assert!(ModelUpdate::default().is_empty());
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_value(UserId::new("u-9")).unwrap(), json!("u-9"));
        assert_eq!(ModelId::from("m-3").to_string(), "m-3");
    }
}
