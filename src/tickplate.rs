//! Main module for tickplate library functionality
//!
//! The pipeline runs leaves first:
//!
//! - [`lexing`] classifies each template line (code, static, fence, noop, ...)
//! - [`literal`] turns runs of static lines into escaped template literals
//! - [`assembling`] scans the template and emits the program text
//! - [`synthesis`] parses the program with the [`script`] language and produces a [`synthesis::Template`]

pub mod assembling;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexing;
pub mod literal;
pub mod script;
pub mod synthesis;
