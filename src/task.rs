// src/task.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db::now_bson;
use crate::error::AppError;
use crate::response::send_response;
use crate::user::User;
use crate::validators::{parse_object_id, require_string};

/// Task lifecycle status. Every state is freely reachable except that a
/// task which reached `done` may only stay `done` or move to `archive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Working,
    Review,
    Done,
    Archive,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Working => "working",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Archive => "archive",
        }
    }

    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        match self {
            TaskStatus::Done => matches!(target, TaskStatus::Done | TaskStatus::Archive),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ObjectId>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create body. Unknown keys fail at parse time, which is the field
/// allow-list.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TaskListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub assignee_id: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TaskListPage {
    pub tasks: Vec<Task>,
    pub page: u64,
    pub total: u64,
}

/// Parses `createdAt:asc,updatedAt:desc` into a Mongo sort document.
/// Only createdAt/updatedAt and asc/desc are accepted, each field once.
fn parse_sort(raw: &str, error_type: &'static str) -> Result<Document, AppError> {
    let mut sort = Document::new();
    for pair in raw.split(',') {
        let (field, direction) = pair.split_once(':').unwrap_or((pair, ""));
        let order = match (field, direction) {
            ("createdAt" | "updatedAt", "asc") => 1,
            ("createdAt" | "updatedAt", "desc") => -1,
            _ => {
                return Err(AppError::bad_request(
                    error_type,
                    format!("Sort Filter {} is not Allowed!", pair),
                ))
            }
        };
        if sort.contains_key(field) {
            return Err(AppError::bad_request(
                error_type,
                format!("Duplicated Sort Filter Key {}", field),
            ));
        }
        sort.insert(field, order);
    }
    Ok(sort)
}

/// Parses and resolves an assignee id from a request body: malformed is
/// a 400, unknown user a 404.
async fn resolve_assignee(
    users: &Collection<User>,
    raw: &str,
    error_type: &'static str,
) -> Result<ObjectId, AppError> {
    let assignee_id = parse_object_id(raw, "assignee", error_type)?;
    if users.find_one(doc! { "_id": assignee_id }).await?.is_none() {
        return Err(AppError::not_found(
            error_type,
            "Assignee Not Found in Users collection",
        ));
    }
    Ok(assignee_id)
}

/// Appends `task_id` to the assignee's task list, creating the list if
/// the user has none yet. `$addToSet` keeps the list duplicate-free.
pub(crate) async fn add_task_to_assignee(
    users: &Collection<User>,
    assignee_id: ObjectId,
    task_id: ObjectId,
) -> Result<(), AppError> {
    users
        .update_one(
            doc! { "_id": assignee_id },
            doc! { "$addToSet": { "tasks": task_id }, "$set": { "updatedAt": now_bson()? } },
        )
        .await?;
    Ok(())
}

/// Removes `task_id` from the assignee's task list. An emptied list is
/// `$unset` so the field disappears rather than lingering as `[]`.
pub(crate) async fn remove_task_from_assignee(
    users: &Collection<User>,
    assignee_id: ObjectId,
    task_id: ObjectId,
) -> Result<(), AppError> {
    let Some(assignee) = users.find_one(doc! { "_id": assignee_id }).await? else {
        return Ok(());
    };
    let Some(mut tasks) = assignee.tasks else {
        return Ok(());
    };
    tasks.retain(|id| *id != task_id);

    if tasks.is_empty() {
        users
            .update_one(
                doc! { "_id": assignee_id },
                doc! { "$unset": { "tasks": 1 }, "$set": { "updatedAt": now_bson()? } },
            )
            .await?;
    } else {
        users
            .update_one(
                doc! { "_id": assignee_id },
                doc! { "$set": { "tasks": tasks, "updatedAt": now_bson()? } },
            )
            .await?;
    }
    Ok(())
}

/// POST /tasks
pub async fn create_task(
    data: web::Data<AppState>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Create Task Error";

    let input: CreateTaskRequest = serde_json::from_value(payload.into_inner())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let name = require_string(input.name, "name", ERR)?;
    let description = require_string(input.description, "description", ERR)?;

    let users_coll = data.mongodb.db.collection::<User>("users");
    let assignee = match input.assignee.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_assignee(&users_coll, raw, ERR).await?),
        None => None,
    };

    let now = Utc::now();
    let new_task = Task {
        id: ObjectId::new(),
        name,
        description,
        status: input.status.unwrap_or(TaskStatus::Pending),
        assignee,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    tasks_coll.insert_one(&new_task).await?;

    // The authoritative task document lands before the denormalized
    // inverse link is touched.
    if let Some(assignee_id) = new_task.assignee {
        add_task_to_assignee(&users_coll, assignee_id, new_task.id).await?;
    }

    info!("Task created: {}", new_task.id);
    Ok(send_response(&new_task, "Create New Task Successfully"))
}

/// GET /tasks
pub async fn get_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Get Tasks Error";

    let query: TaskListQuery = serde_urlencoded::from_str(req.query_string())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).max(1);

    let mut filter = Document::new();
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        filter.insert("status", status);
    }
    if let Some(raw) = query.assignee_id.as_deref().filter(|s| !s.is_empty()) {
        filter.insert("assignee", parse_object_id(raw, "assigneeId", ERR)?);
    }
    let sort = match query.sort.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_sort(raw, ERR)?),
        None => None,
    };

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");

    // Total is the full filtered count, independent of the page window.
    let total = tasks_coll.count_documents(filter.clone()).await?;

    let mut find = tasks_coll
        .find(filter)
        .skip(limit * (page - 1))
        .limit(limit as i64);
    if let Some(sort) = sort {
        find = find.sort(sort);
    }

    let mut cursor = find.await?;
    let mut tasks = Vec::new();
    while let Some(task) = cursor.next().await {
        tasks.push(task?);
    }

    Ok(send_response(
        TaskListPage { tasks, page, total },
        "Get Task List Successfully!",
    ))
}

/// GET /tasks/{task_id}
pub async fn get_task_by_id(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Get Task By Id Error";

    let task_id = parse_object_id(&path, "taskId", ERR)?;
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let task = tasks_coll
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    Ok(send_response(&task, "Get Task By Id Successfully!"))
}

/// PUT /tasks/{task_id}
///
/// Provided non-empty fields override stored ones; the rest keep their
/// previous value. The task document is written before the assignee
/// link so the inverse index only ever references a persisted task.
pub async fn update_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Update Task Error";

    let task_id = parse_object_id(&path, "taskId", ERR)?;
    let input: UpdateTaskRequest = serde_json::from_value(payload.into_inner())
        .map_err(|e| AppError::bad_request(ERR, e.to_string()))?;

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let target = tasks_coll
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    let users_coll = data.mongodb.db.collection::<User>("users");
    let new_assignee = match input.assignee.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(resolve_assignee(&users_coll, raw, ERR).await?),
        None => None,
    };

    // One-way valve out of "done": only "archive" (or staying "done")
    // may be requested once a task has reached it.
    if let Some(requested) = input.status {
        if !target.status.can_transition_to(requested) {
            return Err(AppError::bad_request(
                ERR,
                format!(
                    "Status {} is not allowed! Only \"archive\" option is allowed when task status was done!",
                    requested.as_str()
                ),
            ));
        }
    }

    let mut set_doc = Document::new();
    if let Some(name) = input.name.filter(|s| !s.is_empty()) {
        set_doc.insert("name", name);
    }
    if let Some(description) = input.description.filter(|s| !s.is_empty()) {
        set_doc.insert("description", description);
    }
    if let Some(status) = input.status {
        set_doc.insert("status", status.as_str());
    }
    if let Some(assignee_id) = new_assignee {
        set_doc.insert("assignee", assignee_id);
    }
    set_doc.insert("updatedAt", now_bson()?);

    let updated = tasks_coll
        .find_one_and_update(doc! { "_id": task_id }, doc! { "$set": set_doc })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    // Move the id between inverse lists only after the task write landed.
    if let Some(assignee_id) = new_assignee {
        if target.assignee != Some(assignee_id) {
            if let Some(previous) = target.assignee {
                remove_task_from_assignee(&users_coll, previous, task_id).await?;
            }
            add_task_to_assignee(&users_coll, assignee_id, task_id).await?;
        }
    }

    Ok(send_response(&updated, "Update Task Successfully"))
}

/// DELETE /tasks/softdelete/{task_id}
pub async fn soft_delete_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Soft Delete Task Error";

    let task_id = parse_object_id(&path, "taskId", ERR)?;
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let target = tasks_coll
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    if let Some(assignee_id) = target.assignee {
        let users_coll = data.mongodb.db.collection::<User>("users");
        remove_task_from_assignee(&users_coll, assignee_id, task_id).await?;
    }

    let updated = tasks_coll
        .find_one_and_update(
            doc! { "_id": task_id },
            doc! { "$set": { "isDeleted": true, "updatedAt": now_bson()? } },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    Ok(send_response(&updated, "Soft Delete Task Successfully!"))
}

/// DELETE /tasks/harddelete/{task_id}
pub async fn hard_delete_task(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Hard Delete Task Error";

    let task_id = parse_object_id(&path, "taskId", ERR)?;
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let target = tasks_coll
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    if let Some(assignee_id) = target.assignee {
        let users_coll = data.mongodb.db.collection::<User>("users");
        remove_task_from_assignee(&users_coll, assignee_id, task_id).await?;
    }

    tasks_coll.delete_one(doc! { "_id": task_id }).await?;

    info!("Task hard-deleted: {}", task_id);
    Ok(send_response(&target, "Hard Delete Task Successfully!"))
}

/// DELETE /tasks/{task_id}/assignee
pub async fn delete_task_assignee(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    const ERR: &str = "Delete Task Assignee Error";

    let task_id = parse_object_id(&path, "taskId", ERR)?;
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let target = tasks_coll
        .find_one(doc! { "_id": task_id })
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    if let Some(assignee_id) = target.assignee {
        let users_coll = data.mongodb.db.collection::<User>("users");
        remove_task_from_assignee(&users_coll, assignee_id, task_id).await?;
    }

    let updated = tasks_coll
        .find_one_and_update(
            doc! { "_id": task_id },
            doc! { "$unset": { "assignee": 1 }, "$set": { "updatedAt": now_bson()? } },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found(ERR, "Task Not Found"))?;

    Ok(send_response(&updated, "Delete Task Assignee Successfully!"))
}
