use actix_web::web;

pub mod admin;
pub mod applications;
pub mod bookmarks;
pub mod messages;
pub mod misc;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod tuitions;
pub mod tutors;
pub mod users;

/// Registers every handler. Literal segments such as `/tuitions/mine` and
/// `/notifications/read-all` must be registered before their `{id}` siblings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(misc::health)
        // users and role requests
        .service(users::login_user)
        .service(users::get_me)
        .service(users::update_me)
        .service(users::get_role)
        .service(users::request_role)
        .service(users::my_role_requests)
        // tutors
        .service(tutors::list_tutors)
        .service(tutors::get_tutor)
        .service(tutors::tutor_reviews)
        // tuition posts
        .service(tuitions::create_tuition)
        .service(tuitions::list_tuitions)
        .service(tuitions::my_tuitions)
        .service(tuitions::get_tuition)
        .service(tuitions::update_tuition)
        .service(tuitions::delete_tuition)
        .service(tuitions::tuition_applications)
        // applications
        .service(applications::apply)
        .service(applications::my_applications)
        .service(applications::ongoing_tuitions)
        .service(applications::update_application)
        .service(applications::withdraw_application)
        .service(applications::reject_application)
        // payments
        .service(payments::create_checkout)
        .service(payments::confirm_checkout)
        .service(payments::record_payment)
        .service(payments::my_payments)
        // reviews and bookmarks
        .service(reviews::create_review)
        .service(bookmarks::add_bookmark)
        .service(bookmarks::list_bookmarks)
        .service(bookmarks::remove_bookmark)
        // notifications
        .service(notifications::list_notifications)
        .service(notifications::unread_count)
        .service(notifications::mark_all_read)
        .service(notifications::mark_read)
        .service(notifications::delete_notification)
        // messaging
        .service(messages::send_message)
        .service(messages::list_conversations)
        .service(messages::conversation_messages)
        .service(messages::mark_conversation_read)
        // administration
        .service(admin::list_users)
        .service(admin::change_role)
        .service(admin::delete_user)
        .service(admin::list_role_requests)
        .service(admin::decide_role_request)
        .service(admin::list_all_tuitions)
        .service(admin::moderate_tuition)
        .service(admin::list_payments)
        .service(admin::stats);
}
