use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{Associations, Identifiable, Insertable, Queryable},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Floor plan

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoomEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::dining_tables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TableEntity {
    pub id: i32,
    pub number: String,
    pub capacity: Option<i32>,
    pub room_id: Option<i32>,
}

// Menu

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::meal_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MealCategoryEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::meals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MealEntity {
    pub id: i32,
    pub category_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

// Staff

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::staff)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StaffEntity {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl StaffEntity {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Label stored on per-waitress statistics rows.
    pub fn statistics_label(&self) -> String {
        format!("{} - {} {}", self.username, self.first_name, self.last_name)
            .trim_end()
            .to_string()
    }
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub table_id: i32,
    pub waitress_id: Option<i32>,
    pub is_paid: bool,
    pub is_check_printed: bool,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub table_id: i32,
    pub waitress_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub meal_id: i32,
    pub quantity: i32,
    pub price: Decimal,
    pub item_added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub meal_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

// Statistics

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::statistics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatisticsEntity {
    pub id: i32,
    pub title: String,
    pub date: NaiveDate,
    pub total: Decimal,
    pub waitress_id: i32,
    pub waitress_info: Option<String>,
    pub is_z_checked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::statistics)]
pub struct CreateStatisticsEntity {
    pub title: String,
    pub date: NaiveDate,
    pub total: Decimal,
    pub waitress_id: i32,
    pub waitress_info: Option<String>,
}

/// Period a statistics row aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsTitle {
    Daily,
    Monthly,
    Yearly,
    PerWaitress,
}

impl StatisticsTitle {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsTitle::Daily => "daily",
            StatisticsTitle::Monthly => "monthly",
            StatisticsTitle::Yearly => "yearly",
            StatisticsTitle::PerWaitress => "per_waitress",
        }
    }
}

impl fmt::Display for StatisticsTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticsTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(StatisticsTitle::Daily),
            "monthly" => Ok(StatisticsTitle::Monthly),
            "yearly" => Ok(StatisticsTitle::Yearly),
            "per_waitress" => Ok(StatisticsTitle::PerWaitress),
            other => Err(format!("{other} is not a valid statistics title")),
        }
    }
}
