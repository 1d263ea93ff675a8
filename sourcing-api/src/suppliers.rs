//! Supplier directory and offers

use crate::client::{path_segment, MarketplaceClient};
use crate::types::{Offer, Supplier};
use sourcing_core::SourcingResult;
use sourcing_session::ApiRequest;

impl MarketplaceClient {
    pub async fn suppliers(&self) -> SourcingResult<Vec<Supplier>> {
        self.fetch_list(ApiRequest::get("/api/suppliers/list/"), "suppliers")
            .await
    }

    pub async fn supplier(&self, id: &str) -> SourcingResult<Supplier> {
        let id = path_segment(id, "supplier_id")?;
        self.fetch_record(ApiRequest::get(format!("/api/suppliers/{}/", id)), "supplier")
            .await
    }

    /// Suppliers the backend matched to a quote
    pub async fn matched_suppliers(&self, quote_id: &str) -> SourcingResult<Vec<Supplier>> {
        let quote_id = path_segment(quote_id, "quote_id")?;
        self.fetch_list(
            ApiRequest::get(format!("/api/suppliers/match/{}/", quote_id)),
            "matched_suppliers",
        )
        .await
    }

    pub async fn offers(&self) -> SourcingResult<Vec<Offer>> {
        self.fetch_list(ApiRequest::get("/api/suppliers/offers/"), "offers")
            .await
    }
}
