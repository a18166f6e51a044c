// src/main.rs

mod app_state;
mod config;
mod db;
mod error;
mod response;
mod task;
mod user;
mod validators;

use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::task::{
    create_task, delete_task_assignee, get_task_by_id, get_tasks, hard_delete_task,
    soft_delete_task, update_task,
};
use crate::user::{create_user, delete_user, get_users, update_user};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);

    let frontend_origin =
        env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

    println!("Server running at http://0.0.0.0:{}", config.port);
    println!("Allowed CORS Origin: {}", frontend_origin);

    let port = config.port;
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        // Malformed JSON never reaches a handler; it fails here with the
        // same envelope every other error uses.
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::bad_request("Invalid Request Body", err.to_string()).into()
        });

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
            }))
            .app_data(json_config)
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::get().to(get_tasks))
                    .route("", web::post().to(create_task))
                    .route("/softdelete/{task_id}", web::delete().to(soft_delete_task))
                    .route("/harddelete/{task_id}", web::delete().to(hard_delete_task))
                    .route("/{task_id}", web::get().to(get_task_by_id))
                    .route("/{task_id}", web::put().to(update_task))
                    .route("/{task_id}/assignee", web::delete().to(delete_task_assignee)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("", web::get().to(get_users))
                    .route("", web::post().to(create_user))
                    .route("/{user_id}", web::put().to(update_user))
                    .route("/{user_id}", web::delete().to(delete_user)),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
