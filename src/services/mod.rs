pub mod analyzer;
pub mod content;
pub mod escalation;
pub mod locks;
pub mod moderation;
pub mod notification;
pub mod report;
