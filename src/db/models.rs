use serde::{Deserialize, Serialize};

use crate::quotes::{EventType, QuoteStatus};
use crate::session::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub manufacturer: Option<String>,
    pub category: String,
    pub effect: Option<String>,
    pub price: f64,
    pub duration_seconds: Option<f64>,
    pub active: bool,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Product data without the database-managed timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub manufacturer: Option<String>,
    pub category: String,
    pub effect: Option<String>,
    pub price: f64,
    pub duration_seconds: Option<f64>,
    pub active: bool,
    pub description: String,
    pub image_url: Option<String>,
}

impl From<&Product> for NewProduct {
    fn from(p: &Product) -> Self {
        NewProduct {
            id: p.id.clone(),
            name: p.name.clone(),
            code: p.code.clone(),
            manufacturer: p.manufacturer.clone(),
            category: p.category.clone(),
            effect: p.effect.clone(),
            price: p.price,
            duration_seconds: p.duration_seconds,
            active: p.active,
            description: p.description.clone(),
            image_url: p.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub event_date: String,
    pub event_type: EventType,
    pub location: String,
    pub guest_count: Option<i64>,
    pub budget: Option<f64>,
    pub interest: Option<String>,
    pub message: String,
    pub status: QuoteStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A validated quote request ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuoteRequest {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub event_date: String,
    pub event_type: EventType,
    pub location: String,
    pub guest_count: Option<i64>,
    pub budget: Option<f64>,
    pub interest: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

/// Stats returned by `fireshow stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub products: i64,
    pub active_products: i64,
    pub quote_requests: i64,
    pub open_quote_requests: i64,
    pub staff: i64,
    pub categories: Vec<CategoryCount>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}
