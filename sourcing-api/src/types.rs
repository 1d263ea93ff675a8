//! Payloads of the marketplace endpoints
//!
//! Every field is optional on the wire. Missing or null values fall back to
//! defaults so a partial record still parses.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept numeric or string primary keys
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = flexible_id(deserializer)?;
    Ok(Some(id).filter(|id| !id.is_empty()))
}

/// Null strings read as empty
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

/// Buyer's request for quotation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quote {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub requirements: String,
    #[serde(deserialize_with = "lenient_string")]
    pub industry: String,
    #[serde(deserialize_with = "lenient_string")]
    pub details: String,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Fields accepted by the quote creation endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewQuote {
    pub name: String,
    pub requirements: String,
    pub industry: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplierContact {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub position: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    pub website: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Supplier {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub country: String,
    pub established_year: Option<i32>,
    #[serde(deserialize_with = "lenient_string")]
    pub employees: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub min_order_value: String,
    #[serde(deserialize_with = "lenient_string")]
    pub production_capacity: String,
    pub verified: bool,
    pub contact: Option<SupplierContact>,
}

/// Supplier's priced answer to a quote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offer {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub supplier: Option<Supplier>,
    pub quote: Option<Quote>,
    #[serde(deserialize_with = "lenient_string")]
    pub offer_price: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderParty {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shipping {
    pub method: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub order_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "optional_id")]
    pub quote_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub total_price: String,
    pub created_at: Option<String>,
    pub customer: Option<OrderParty>,
    pub supplier: Option<OrderParty>,
    pub shipping: Option<Shipping>,
}

/// One entry of an order's timeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderEvent {
    #[serde(deserialize_with = "lenient_string")]
    pub event: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub user: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub last_message: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub sender: String,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: Option<String>,
}

/// Account profile of the logged-in user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub company: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub industry: String,
    pub profile_image: Option<String>,
}

/// Editable profile fields; unset fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_records_parse() {
        let supplier: Supplier = serde_json::from_value(json!({
            "id": 3,
            "name": "Acme Textiles",
            "category": null,
            "description": null,
            "verified": true,
            "contact": {"name": "Jo", "email": "jo@acme.test", "website": null}
        }))
        .unwrap();

        assert_eq!(supplier.id, "3");
        assert_eq!(supplier.description, "");
        assert!(supplier.category.is_none());
        assert_eq!(supplier.contact.unwrap().email, "jo@acme.test");
    }

    #[test]
    fn test_string_and_numeric_ids() {
        let notification: Notification =
            serde_json::from_value(json!({"id": "notif-1", "type": "quote", "read": false}))
                .unwrap();
        assert_eq!(notification.id, "notif-1");
        assert_eq!(notification.kind.as_deref(), Some("quote"));

        let order: Order =
            serde_json::from_value(json!({"id": 12, "quote_id": 4, "total_price": 99.5})).unwrap();
        assert_eq!(order.quote_id.as_deref(), Some("4"));
        assert_eq!(order.total_price, "99.5");

        let order: Order = serde_json::from_value(json!({"id": 12, "quote_id": null})).unwrap();
        assert!(order.quote_id.is_none());
    }

    #[test]
    fn test_new_quote_omits_unset_fields() {
        let quote = NewQuote {
            name: "Bolts".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(&quote).unwrap();
        assert_eq!(body["name"], "Bolts");
        assert!(body.get("quantity").is_none());
    }
}
