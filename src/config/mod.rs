pub mod database;
pub mod moderation;
pub mod rules;
