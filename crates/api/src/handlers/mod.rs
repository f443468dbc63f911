pub mod expressions;
pub mod health;
pub mod tasks;
