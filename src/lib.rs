//! Idiom checker for event-driven control-system scripts.
//!
//! A script is parsed into a typed syntax tree, each enabled
//! [`rules::Matcher`] looks for one idiom, and [`report`] turns the matches
//! into located, de-duplicated [`report::Diagnostic`]s. [`scan`] runs that
//! pipeline over many files in parallel.

pub mod cli;
pub mod config;
pub mod fix;
pub mod model;
pub mod report;
pub mod rules;
pub mod scan;
pub mod suppress;
pub mod syntax;
