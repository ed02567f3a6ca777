pub mod app;
pub mod apply;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod heuristics;
pub mod naming;
pub mod output;
pub mod planner;
pub mod progress;
pub mod providers {
    pub mod crossref;
}
pub mod resolver;
pub mod scan;
pub mod task;
pub mod tui;
