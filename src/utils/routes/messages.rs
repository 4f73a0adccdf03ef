use actix_web::{get, patch, post, web, HttpResponse};
use serde_json::json;

use crate::data::messages::{Conversation, Message, NewMessage};
use crate::data::notifications::{deliver, Notice};
use crate::data::users::{PublicProfile, User};
use crate::error::Result;
use crate::state::AppState;
use crate::utils::gate::Member;

#[post("/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    Member(sender): Member,
    body: web::Json<NewMessage>,
) -> Result<HttpResponse> {
    let new = body.into_inner();
    let sender_name = sender.name.clone();
    let (message, conversation) = state
        .db
        .run(move |conn| Message::send(conn, &sender.email, new))
        .await?;

    deliver(
        &state.db,
        vec![Notice::new(
            message.recipient_email.clone(),
            "message",
            format!("New message from {}", sender_name),
        )
        .link(format!("/conversations/{}", conversation.id))],
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "conversationId": conversation.id
    })))
}

#[get("/conversations")]
pub async fn list_conversations(
    state: web::Data<AppState>,
    Member(user): Member,
) -> Result<HttpResponse> {
    let rows = state
        .db
        .run(move |conn| {
            let mut rows = Vec::new();
            for conversation in Conversation::for_participant(conn, &user.email)? {
                let other = User::find(conn, conversation.other_participant(&user.email))?
                    .map(PublicProfile::from);
                let unread = Conversation::unread_for(conn, &conversation.id, &user.email)?;
                rows.push(json!({
                    "id": conversation.id,
                    "participant": other,
                    "lastMessage": conversation.last_message,
                    "updatedAt": conversation.updated_at,
                    "unread": unread
                }));
            }
            Ok(rows)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "conversations": rows
    })))
}

#[get("/conversations/{id}/messages")]
pub async fn conversation_messages(
    state: web::Data<AppState>,
    Member(user): Member,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let messages = state
        .db
        .run(move |conn| {
            let conversation = Conversation::get_for(conn, &id, &user.email)?;
            Message::in_conversation(conn, &conversation.id)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "messages": messages
    })))
}

#[patch("/conversations/{id}/read")]
pub async fn mark_conversation_read(
    state: web::Data<AppState>,
    Member(user): Member,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let updated = state
        .db
        .run(move |conn| {
            let conversation = Conversation::get_for(conn, &id, &user.email)?;
            Message::mark_read(conn, &conversation.id, &user.email)
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "updated": updated
    })))
}
