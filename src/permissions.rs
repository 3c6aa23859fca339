//! Role based authorization.
//!
//! Every staff member carries one [`Role`]; each [`Action`] lists the roles allowed to perform
//! it. Handlers call [`Actor::authorize`] before touching any state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    common::app_error::AppError,
    models::{OrderEntity, StaffEntity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Waitress,
    CaptainWaitress,
    Admin,
    /// The restaurant account itself.
    #[serde(rename = "restaurant")]
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Waitress => "waitress",
            Role::CaptainWaitress => "captain_waitress",
            Role::Admin => "admin",
            Role::Owner => "restaurant",
        }
    }

    /// Whether staff with this role can be the waitress of record on an order.
    pub fn serves_tables(&self) -> bool {
        matches!(self, Role::Waitress | Role::CaptainWaitress)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waitress" => Ok(Role::Waitress),
            "captain_waitress" => Ok(Role::CaptainWaitress),
            "admin" => Ok(Role::Admin),
            "restaurant" => Ok(Role::Owner),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewFloor,
    ViewMenu,
    ViewOrder,
    CreateOrder,
    AddItem,
    RemoveItem,
    Checkout,
    ReassignTable,
    ReassignWaitress,
    PrintCheck,
    ResetCheckPrinted,
    ViewStatistics,
    CalculateStatistics,
    ZReport,
}

const EVERYONE: &[Role] = &[Role::Waitress, Role::CaptainWaitress, Role::Admin, Role::Owner];
const MANAGERS: &[Role] = &[Role::Admin, Role::Owner];

impl Action {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Action::ViewFloor | Action::ViewMenu | Action::ViewOrder => EVERYONE,
            Action::CreateOrder | Action::AddItem => EVERYONE,
            Action::RemoveItem
            | Action::Checkout
            | Action::ReassignTable
            | Action::ReassignWaitress
            | Action::PrintCheck
            | Action::ResetCheckPrinted => MANAGERS,
            Action::ViewStatistics | Action::CalculateStatistics | Action::ZReport => MANAGERS,
        }
    }

    pub fn is_allowed_for(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

/// The staff member a request acts on behalf of.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
    pub name: String,
}

impl Actor {
    pub fn from_staff(staff: &StaffEntity) -> Result<Self, AppError> {
        let role = staff
            .role
            .parse::<Role>()
            .map_err(|err| AppError::Unauthorized(format!("Staff #{}: {err}", staff.id)))?;

        Ok(Self {
            id: staff.id,
            role,
            name: staff.full_name(),
        })
    }

    pub fn authorize(&self, action: Action) -> Result<(), AppError> {
        if action.is_allowed_for(self.role) {
            Ok(())
        } else {
            tracing::debug!(actor = self.id, role = %self.role, ?action, "Action denied");
            Err(AppError::ForbiddenResource(format!(
                "Role {} may not perform {:?}",
                self.role, action
            )))
        }
    }

    /// Waitresses only see the orders they serve; everyone else sees every order.
    pub fn ensure_order_access(&self, order: &OrderEntity) -> Result<(), AppError> {
        if self.role == Role::Waitress && order.waitress_id != Some(self.id) {
            return Err(AppError::NotFound(format!("Order #{}", order.id)));
        }
        Ok(())
    }
}
