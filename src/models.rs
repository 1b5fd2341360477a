//! Documents stored for each establishment
//!
//! Every record is a plain serde struct. They are kept free of
//! `skip_serializing_if`, `flatten` and internally tagged enums so the same
//! types can be written to JSON collections and to bincode backups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::subscription::Plan;
use crate::tutorial::TutorialStep;

/// Fresh document identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Image stored on the hosting service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedImage {
    pub url: String,
    /// Token allowing the image to be deleted without account credentials
    #[serde(default)]
    pub delete_token: Option<String>,
}

/// Establishment account (bar, restaurant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub establishment_name: String,
    pub owner_name: String,
    pub email: String,
    pub password_hash: String,
    pub whatsapp: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub logo: Option<HostedImage>,
    pub plan: Plan,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tutorial_step: TutorialStep,
    #[serde(default)]
    pub push_tokens: Vec<String>,
    /// Merchant wallet receiving ticket sales
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub disbursement_id: Option<String>,
    #[serde(default)]
    pub reset_code: Option<String>,
    #[serde(default)]
    pub reset_code_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// New profile with no trial and no subscription yet
    pub fn new(
        establishment_name: &str,
        owner_name: &str,
        email: &str,
        whatsapp: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            establishment_name: establishment_name.to_string(),
            owner_name: owner_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            whatsapp: whatsapp.to_string(),
            address: None,
            location: None,
            logo: None,
            plan: Plan::Expired,
            trial_ends_at: None,
            subscription_ends_at: None,
            tutorial_step: TutorialStep::Welcome,
            push_tokens: Vec::new(),
            wallet: None,
            disbursement_id: None,
            reset_code: None,
            reset_code_expires: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One ingredient of a product's food-cost breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    /// Cost of one `unit`, in FCFA
    pub unit_cost: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodCost {
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: i64,
    #[serde(default)]
    pub cost: i64,
    pub quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub food_cost: Option<FoodCost>,
    #[serde(default)]
    pub image: Option<HostedImage>,
    /// Shown on the public digital menu
    #[serde(default = "default_true")]
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    #[serde(default)]
    pub seats: u32,
    #[serde(default)]
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Sent,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Sent => "sent",
            OrderStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    AirtelMoney,
    MoovMoney,
    Card,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::AirtelMoney => "airtel_money",
            PaymentMethod::MoovMoney => "moov_money",
            PaymentMethod::Card => "card",
        }
    }
}

/// Order line, priced when the order was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }

    /// Line total, `None` when it does not fit in an `i64`
    pub fn checked_line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// Order taken at the bar or a table (`barOrders` collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub establishment_id: String,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// Team member who took the order
    #[serde(default)]
    pub served_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub establishment_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: u32,
    pub ticket_price: i64,
    #[serde(default)]
    pub image: Option<HostedImage>,
    #[serde(default)]
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Paid,
    Cancelled,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Paid => "paid",
            TicketStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub establishment_id: String,
    pub event_id: String,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub quantity: u32,
    pub amount: i64,
    pub status: TicketStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Earned,
    Redeemed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub at: DateTime<Utc>,
    pub kind: RewardKind,
    pub points: i64,
    pub description: String,
}

/// Loyalty customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub total_spent: i64,
    #[serde(default)]
    pub visits: u32,
    #[serde(default)]
    pub last_visit_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rewards: Vec<RewardEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Manager,
    Cashier,
    Waiter,
    Barman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub establishment_id: String,
    pub name: String,
    pub role: TeamRole,
    pub status: MemberStatus,
    pub access_code: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Platform administrator; the id is the promoted profile's id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub promoted_at: DateTime<Utc>,
    pub promoted_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Subscription { months: u32 },
    Ticket { ticket_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Payment requested through the gateway; the id is the gateway reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub establishment_id: String,
    pub purpose: PaymentPurpose,
    pub amount: i64,
    pub status: PaymentStatus,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
