//! Database access. One module per table family; every function takes the
//! pool (or a connection when it must run inside a caller's transaction)
//! and returns `Result<_, AppError>`.

pub mod achievement;
pub mod communication;
pub mod dashboard;
pub mod entity;
pub mod hearing;
pub mod meeting;
pub mod notification;
pub mod refresh_token;
pub mod subject;
pub mod task;
pub mod user;
