pub mod common;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod heuristic;
pub mod map;
pub mod planner;
pub mod scenario;
pub mod solver;
pub mod space;
pub mod stat;
