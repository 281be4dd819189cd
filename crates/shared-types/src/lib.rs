pub mod error;
pub mod feature_flags;

pub mod achievement;
pub mod common;
pub mod communication;
pub mod dashboard;
pub mod entity;
pub mod hearing;
pub mod import;
pub mod meeting;
pub mod role;
pub mod subject;
pub mod task;
pub mod user;

pub use error::*;
pub use feature_flags::*;

pub use achievement::*;
pub use common::*;
pub use communication::*;
pub use dashboard::*;
pub use entity::*;
pub use hearing::*;
pub use import::*;
pub use meeting::*;
pub use role::*;
pub use subject::*;
pub use task::*;
pub use user::*;
