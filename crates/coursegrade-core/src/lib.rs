//! coursegrade-core: course data model, quiz grading, and reporting.
//!
//! This crate defines the course/quiz data model, the in-memory store and
//! its integrity rules, and the grading logic that turns a learner's
//! submitted answers into a normalized grade.

pub mod catalog;
pub mod config;
pub mod error;
pub mod grading;
pub mod model;
pub mod report;
pub mod repository;
pub mod statistics;
pub mod store;
