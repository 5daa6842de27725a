//! Quillboard - a moderated blog backend
//!
//! Users write articles, admins approve or reject them, and authors are
//! notified of the outcome. Roles live in their own table and every user
//! points at one.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
