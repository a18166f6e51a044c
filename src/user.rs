// src/user.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::db::now_bson;
use crate::error::AppError;
use crate::response::send_response;
use crate::task::Task;
use crate::validators::{parse_object_id, require_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Employee,
    Manager,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "Employee",
            UserRole::Manager => "Manager",
        }
    }

    /// Accepts any casing ("manager", "MANAGER") and yields the stored
    /// spelling; anything outside the enum is None.
    pub fn parse_normalized(raw: &str) -> Option<UserRole> {
        match normalize_role_casing(raw).as_str() {
            "Employee" => Some(UserRole::Employee),
            "Manager" => Some(UserRole::Manager),
            _ => None,
        }
    }
}

/// First letter capitalized, rest lowercased: "mAnAgEr" -> "Manager".
pub(crate) fn normalize_role_casing(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub role: UserRole,
    /// Denormalized inverse of Task.assignee; absent rather than empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<ObjectId>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as returned by the list endpoint, task ids swapped for the
/// referenced documents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListPage {
    pub users: Vec<PopulatedUser>,
    pub page: u64,
    pub total_pages: u64,
}

pub(crate) fn populate_users(
    users: Vec<User>,
    tasks_by_id: &HashMap<ObjectId, Task>,
) -> Vec<PopulatedUser> {
    users
        .into_iter()
        .map(|user| {
            let tasks = user.tasks.map(|ids| {
                ids.iter()
                    .filter_map(|id| tasks_by_id.get(id).cloned())
                    .collect()
            });
            PopulatedUser {
                id: user.id,
                name: user.name,
                role: user.role,
                tasks,
                created_at: user.created_at,
                updated_at: user.updated_at,
            }
        })
        .collect()
}

/// ceil(total / limit); the User list reports page count where the Task
/// list reports the raw total.
pub(crate) fn total_pages(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

/// POST /users
pub async fn create_user(
    data: web::Data<AppState>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Create User Error";

    let input: CreateUserRequest = serde_json::from_value(payload.into_inner())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let name = require_string(input.name, "name", ERR)?;

    let now = Utc::now();
    // Role is not an input: every user starts as Employee.
    let new_user = User {
        id: ObjectId::new(),
        name,
        role: UserRole::Employee,
        tasks: None,
        created_at: now,
        updated_at: now,
    };

    let users_coll = data.mongodb.db.collection::<User>("users");
    users_coll.insert_one(&new_user).await?;

    info!("User created: {}", new_user.id);
    Ok(send_response(&new_user, "Create New User Successfully!"))
}

/// GET /users
pub async fn get_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Get Users Error";

    let query: UserListQuery = serde_urlencoded::from_str(req.query_string())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).max(1);

    let mut filter = Document::new();
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        filter.insert(
            "name",
            doc! { "$regex": regex::escape(search), "$options": "i" },
        );
    }
    if let Some(role) = query.role.as_deref().filter(|s| !s.is_empty()) {
        // Normalized casing only; an unknown role is a filter that
        // matches nothing, not an error.
        filter.insert("role", normalize_role_casing(role));
    }

    let users_coll = data.mongodb.db.collection::<User>("users");
    let total = users_coll.count_documents(filter.clone()).await?;

    let mut cursor = users_coll
        .find(filter)
        .skip(limit * (page - 1))
        .limit(limit as i64)
        .await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.next().await {
        users.push(user?);
    }

    // Populate the page's task references with a single $in query.
    let task_ids: Vec<ObjectId> = users
        .iter()
        .filter_map(|user| user.tasks.as_ref())
        .flatten()
        .copied()
        .collect();
    let mut tasks_by_id = HashMap::new();
    if !task_ids.is_empty() {
        let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
        let mut task_cursor = tasks_coll
            .find(doc! { "_id": { "$in": task_ids } })
            .await?;
        while let Some(task) = task_cursor.next().await {
            let task = task?;
            tasks_by_id.insert(task.id, task);
        }
    }

    Ok(send_response(
        UserListPage {
            users: populate_users(users, &tasks_by_id),
            page,
            total_pages: total_pages(total, limit),
        },
        "Get User List Successfully!",
    ))
}

/// PUT /users/{user_id}
pub async fn update_user(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Update User Error";

    let user_id = parse_object_id(&path, "userId", ERR)?;
    let input: UpdateUserRequest = serde_json::from_value(payload.into_inner())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let users_coll = data.mongodb.db.collection::<User>("users");
    users_coll
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "User Not Found"))?;

    let mut set_doc = Document::new();
    if let Some(name) = input.name {
        set_doc.insert("name", name);
    }
    if let Some(raw) = input.role.filter(|s| !s.is_empty()) {
        let role = UserRole::parse_normalized(&raw).ok_or_else(|| {
            AppError::bad_request(
                ERR,
                format!("Role input {} is not allowed", normalize_role_casing(&raw)),
            )
        })?;
        set_doc.insert("role", role.as_str());
    }
    set_doc.insert("updatedAt", now_bson()?);

    let updated = users_coll
        .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": set_doc })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "User Not Found"))?;

    Ok(send_response(&updated, "Update User Successfully!"))
}

/// DELETE /users/{user_id}
///
/// Permanent removal. Tasks that reference the user keep their
/// `assignee` field; there is no cascade.
pub async fn delete_user(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Delete User Error";

    let user_id = parse_object_id(&path, "userId", ERR)?;
    let users_coll = data.mongodb.db.collection::<User>("users");
    let target = users_coll
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "User Not Found"))?;

    users_coll.delete_one(doc! { "_id": user_id }).await?;

    info!("User deleted: {}", user_id);
    Ok(send_response(&target, "Delete User Successfully!"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use serde_json::json;

    #[test]
    fn role_casing_is_normalized() {
        assert_eq!(normalize_role_casing("manager"), "Manager");
        assert_eq!(normalize_role_casing("EMPLOYEE"), "Employee");
        assert_eq!(normalize_role_casing("mAnAgEr"), "Manager");
        assert_eq!(normalize_role_casing(""), "");
    }

    #[test]
    fn role_parse_accepts_any_casing() {
        assert_eq!(UserRole::parse_normalized("manager"), Some(UserRole::Manager));
        assert_eq!(UserRole::parse_normalized("Employee"), Some(UserRole::Employee));
        assert_eq!(UserRole::parse_normalized("boss"), None);
        assert_eq!(UserRole::parse_normalized(""), None);
    }

    #[test]
    fn role_serializes_with_stored_spelling() {
        assert_eq!(serde_json::to_value(UserRole::Manager).unwrap(), json!("Manager"));
        assert_eq!(serde_json::to_value(UserRole::Employee).unwrap(), json!("Employee"));
    }

    #[test]
    fn create_request_rejects_unknown_keys() {
        let err = serde_json::from_value::<CreateUserRequest>(json!({
            "name": "An",
            "role": "Manager"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn update_request_rejects_unknown_keys() {
        assert!(serde_json::from_value::<UpdateUserRequest>(json!({ "tasks": [] })).is_err());
    }

    #[test]
    fn list_query_parses_allowed_keys() {
        let query: UserListQuery =
            serde_urlencoded::from_str("search=an&role=manager&page=1&limit=2").unwrap();
        assert_eq!(query.search.as_deref(), Some("an"));
        assert_eq!(query.role.as_deref(), Some("manager"));
    }

    #[test]
    fn list_query_rejects_unknown_keys() {
        assert!(serde_urlencoded::from_str::<UserListQuery>("role=manager&sort=name").is_err());
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(3, 1), 3);
        assert_eq!(total_pages(3, 2), 2);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
    }

    fn sample_task(now: DateTime<Utc>) -> Task {
        Task {
            id: ObjectId::new(),
            name: "t".into(),
            description: "d".into(),
            status: TaskStatus::Pending,
            assignee: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn populate_swaps_ids_for_documents() {
        let now = Utc::now();
        let task = sample_task(now);
        let with_tasks = User {
            id: ObjectId::new(),
            name: "a".into(),
            role: UserRole::Employee,
            tasks: Some(vec![task.id]),
            created_at: now,
            updated_at: now,
        };
        let without_tasks = User {
            id: ObjectId::new(),
            name: "b".into(),
            role: UserRole::Manager,
            tasks: None,
            created_at: now,
            updated_at: now,
        };

        let mut tasks_by_id = HashMap::new();
        tasks_by_id.insert(task.id, task.clone());

        let populated = populate_users(vec![with_tasks, without_tasks], &tasks_by_id);
        assert_eq!(populated.len(), 2);
        assert_eq!(populated[0].tasks.as_ref().unwrap()[0].id, task.id);
        assert!(populated[1].tasks.is_none());
    }

    #[test]
    fn populate_drops_dangling_references() {
        let now = Utc::now();
        let user = User {
            id: ObjectId::new(),
            name: "a".into(),
            role: UserRole::Employee,
            tasks: Some(vec![ObjectId::new()]),
            created_at: now,
            updated_at: now,
        };
        let populated = populate_users(vec![user], &HashMap::new());
        assert!(populated[0].tasks.as_ref().unwrap().is_empty());
    }
}
