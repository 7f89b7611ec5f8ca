use serde::{Deserialize, Serialize};

/// Soft-delete lifecycle shared by doctors and patients. Stored as the
/// `is_active` column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Copy, Clone)]
pub enum AccountStatus {
    Active,
    Deactivated,
}

impl AccountStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn toggled(&self) -> Self {
        match self {
            AccountStatus::Active => AccountStatus::Deactivated,
            AccountStatus::Deactivated => AccountStatus::Active,
        }
    }
}

impl From<bool> for AccountStatus {
    fn from(is_active: bool) -> Self {
        if is_active {
            AccountStatus::Active
        } else {
            AccountStatus::Deactivated
        }
    }
}
