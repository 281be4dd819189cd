pub mod access;
pub mod auth;
pub mod config;
pub mod csv_import;
pub mod db;
pub mod error_convert;
pub mod health;
pub mod messaging;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod rest;
pub mod storage;
pub mod telemetry;

// Channel transports
pub mod mailgun;
pub mod telegram;
pub mod twilio;
