//! Tier grading and win flagging of fixture odds movement, plus the row
//! feed, storage and dashboard around it.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod feed;
pub mod grading;
pub mod view;
