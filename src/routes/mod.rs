pub mod blueprints;
pub mod exams;
pub mod health;
pub mod questions;
