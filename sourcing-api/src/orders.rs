//! Order endpoints

use crate::client::{path_segment, MarketplaceClient};
use crate::types::{Order, OrderEvent};
use sourcing_core::SourcingResult;
use sourcing_session::ApiRequest;

impl MarketplaceClient {
    pub async fn order(&self, id: &str) -> SourcingResult<Order> {
        let id = path_segment(id, "order_id")?;
        self.fetch_record(ApiRequest::get(format!("/orders/{}/", id)), "order")
            .await
    }

    /// Timeline events of an order, oldest first as the backend sends them
    pub async fn order_timeline(&self, id: &str) -> SourcingResult<Vec<OrderEvent>> {
        let id = path_segment(id, "order_id")?;
        self.fetch_list(
            ApiRequest::get(format!("/api/orders/{}/timeline/", id)),
            "order_timeline",
        )
        .await
    }
}
