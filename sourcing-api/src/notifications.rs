//! Notification endpoints

use crate::client::{path_segment, MarketplaceClient};
use crate::types::Notification;
use serde_json::json;
use sourcing_core::SourcingResult;
use sourcing_session::ApiRequest;
use tracing::info;

impl MarketplaceClient {
    pub async fn notifications(&self) -> SourcingResult<Vec<Notification>> {
        self.fetch_list(ApiRequest::get("/notifications/my/"), "notifications")
            .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> SourcingResult<()> {
        let id = path_segment(id, "notification_id")?;
        self.execute(
            ApiRequest::post("/notifications/mark-read/").json(json!({ "id": id })),
            "mark_notification_read",
        )
        .await?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self) -> SourcingResult<()> {
        self.execute(
            ApiRequest::post("/notifications/mark-all-read/"),
            "mark_all_notifications_read",
        )
        .await?;
        info!("Marked all notifications read");
        Ok(())
    }
}
