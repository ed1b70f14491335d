pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod groups;
pub mod layout;
pub mod materialize;
pub mod output;
pub mod planner;
pub mod samples;
pub mod samtools;
pub mod submit;
pub mod template;
