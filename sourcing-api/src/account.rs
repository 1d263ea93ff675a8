//! Profile and password endpoints

use crate::client::MarketplaceClient;
use crate::parse::parse_record;
use crate::types::{Profile, ProfileUpdate};
use serde_json::{json, Value};
use sourcing_core::{log_operation_success, validation_error, SourcingResult};
use sourcing_session::ApiRequest;

const PROFILE_PATH: &str = "/profile/";
const SET_PASSWORD_PATH: &str = "/auth/users/set_password/";

/// Profile responses are sometimes wrapped in `data`
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut fields) if fields.get("data").is_some_and(Value::is_object) => {
            fields.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

impl MarketplaceClient {
    pub async fn profile(&self) -> SourcingResult<Profile> {
        let body = self.execute(ApiRequest::get(PROFILE_PATH), "profile").await?;
        parse_record(unwrap_data(body), "profile")
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> SourcingResult<Profile> {
        if update.is_empty() {
            return Err(validation_error!(
                "Nothing to update",
                "profile",
                "marketplace_client"
            ));
        }

        let body = self
            .execute(
                ApiRequest::put(PROFILE_PATH).json(serde_json::to_value(update)?),
                "update_profile",
            )
            .await?;
        let profile = parse_record(unwrap_data(body), "update_profile")?;
        log_operation_success!("update_profile");
        Ok(profile)
    }

    /// Change the account password; the current session stays valid
    pub async fn change_password(&self, current: &str, new: &str) -> SourcingResult<()> {
        if new.is_empty() {
            return Err(validation_error!(
                "New password is empty",
                "new_password",
                "marketplace_client"
            ));
        }
        if new == current {
            return Err(validation_error!(
                "New password matches the current one",
                "new_password",
                "marketplace_client"
            ));
        }

        self.execute(
            ApiRequest::post(SET_PASSWORD_PATH).json(json!({
                "current_password": current,
                "new_password": new,
            })),
            "change_password",
        )
        .await?;
        log_operation_success!("change_password");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_data() {
        assert_eq!(
            unwrap_data(json!({"message": "ok", "data": {"id": 1}})),
            json!({"id": 1})
        );
        assert_eq!(unwrap_data(json!({"id": 1})), json!({"id": 1}));
        assert_eq!(
            unwrap_data(json!({"id": 1, "data": "x"})),
            json!({"id": 1, "data": "x"})
        );
    }

    #[test]
    fn test_empty_update() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate {
            phone: Some("+1 555".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
