//! Common utilities shared across Lookalike crates.
//!
//! This crate is intentionally lightweight so that every crate in the
//! workspace can depend on it without pulling in heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`natord`]: Natural ("human") ordering for file and directory names
//!
//! # Examples
//!
//! ```rust
//! use lookalike_common::natord;
//!
//! let mut names = vec!["img10", "img2", "img1"];
//! natord::sort_natural(&mut names, |s| s);
//! assert_eq!(names, ["img1", "img2", "img10"]);
//! ```

pub mod natord;
pub mod observability;
