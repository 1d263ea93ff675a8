//! Quote endpoints

use crate::client::{path_segment, MarketplaceClient};
use crate::types::{NewQuote, Quote};
use sourcing_core::{log_operation_success, SourcingResult};
use sourcing_session::ApiRequest;

impl MarketplaceClient {
    /// Quotes created by the current buyer
    pub async fn my_quotes(&self) -> SourcingResult<Vec<Quote>> {
        self.fetch_list(ApiRequest::get("/quotes/my/"), "quotes").await
    }

    pub async fn quote(&self, id: &str) -> SourcingResult<Quote> {
        let id = path_segment(id, "quote_id")?;
        self.fetch_record(ApiRequest::get(format!("/quotes/{}/", id)), "quote")
            .await
    }

    pub async fn create_quote(&self, quote: &NewQuote) -> SourcingResult<Quote> {
        let body = serde_json::to_value(quote)?;
        let created: Quote = self
            .fetch_record(ApiRequest::post("/quotes/create/").json(body), "create_quote")
            .await?;
        log_operation_success!("create_quote", quote_id = %created.id);
        Ok(created)
    }

    pub async fn delete_quote(&self, id: &str) -> SourcingResult<()> {
        let id = path_segment(id, "quote_id")?;
        self.execute(
            ApiRequest::delete(format!("/quotes/delete/{}/", id)),
            "delete_quote",
        )
        .await?;
        log_operation_success!("delete_quote", quote_id = %id);
        Ok(())
    }

    /// Quotes visible to the current supplier
    pub async fn supplier_quotes(&self) -> SourcingResult<Vec<Quote>> {
        self.fetch_list(ApiRequest::get("/quotes/supplier/quotes/"), "supplier_quotes")
            .await
    }
}
