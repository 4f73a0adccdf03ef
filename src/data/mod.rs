pub mod applications;
pub mod bookmarks;
pub mod database;
pub mod hiring;
pub mod listing;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod role_requests;
pub mod tuitions;
pub mod users;
