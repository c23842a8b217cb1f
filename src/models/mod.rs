pub mod notification;
pub mod post;
pub mod report;
pub mod topic;

pub use notification::{Entity as Notification, Model as NotificationModel};
pub use post::{Entity as Post, Model as PostModel};
pub use report::{
    ContentKey, ContentType, Entity as Report, Model as ReportModel, ReportReason,
    ResolutionAction,
};
pub use topic::{Entity as Topic, Model as TopicModel};
