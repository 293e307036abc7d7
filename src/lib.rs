//! Story Buddy
//!
//! Backend for generating illustrated children's stories. A submission
//! returns a job id at once while a background pipeline writes the story
//! text and, optionally, four comic panels produced through an
//! OpenAI-compatible API and stored in S3.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
