//! Conversations and messages

use crate::client::{path_segment, MarketplaceClient};
use crate::types::{Conversation, Message};
use serde_json::json;
use sourcing_core::{validation_error, SourcingResult};
use sourcing_session::ApiRequest;

impl MarketplaceClient {
    pub async fn inbox(&self) -> SourcingResult<Vec<Conversation>> {
        self.fetch_list(ApiRequest::get("/api/messages/inbox/"), "inbox")
            .await
    }

    pub async fn conversation_messages(&self, conversation_id: &str) -> SourcingResult<Vec<Message>> {
        let conversation_id = path_segment(conversation_id, "conversation_id")?;
        self.fetch_list(
            ApiRequest::get(format!("/api/messages/{}/", conversation_id)),
            "messages",
        )
        .await
    }

    /// Post a message and return the stored copy when the backend echoes one
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> SourcingResult<Option<Message>> {
        let conversation_id = path_segment(conversation_id, "conversation_id")?;
        if content.trim().is_empty() {
            return Err(validation_error!(
                "Message content is empty",
                "content",
                "marketplace_client"
            ));
        }

        let body = self
            .execute(
                ApiRequest::post("/conversations/send-message/").json(json!({
                    "conversation_id": conversation_id,
                    "content": content,
                })),
                "send_message",
            )
            .await?;

        let echoed = serde_json::from_value::<Message>(body).ok();
        Ok(echoed.filter(|message| !message.id.is_empty()))
    }
}
