pub mod analytics;
pub mod auth;
pub mod backup;
pub mod catalog;
pub mod classes;
pub mod core;
pub mod exchange;
pub mod logs;
pub mod records;
pub mod settings;
pub mod students;
pub mod users;
