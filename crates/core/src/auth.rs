use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clinical role of a logged-in staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Nursing staff. Default for unrecognised roles.
    Nurse,
    /// Medical doctor.
    Doctor,
}

impl StaffRole {
    /// Parses a role handed over by the staff portal.
    ///
    /// Only `doctor` (case-insensitive) maps to [`StaffRole::Doctor`]; any
    /// other value, including a missing one, is treated as a nurse.
    #[must_use]
    pub fn from_portal_value(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("doctor") => Self::Doctor,
            _ => Self::Nurse,
        }
    }

    /// Returns the stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nurse => "nurse",
            Self::Doctor => "doctor",
        }
    }
}

/// Staff information persisted in the session after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffIdentity {
    id: String,
    name: String,
    role: StaffRole,
    login_time: DateTime<Utc>,
}

impl StaffIdentity {
    /// Creates a staff identity from portal data.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: StaffRole,
        login_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            login_time,
        }
    }

    /// Returns the staff identifier issued by the staff portal.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the display name of the staff member.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the clinical role.
    #[must_use]
    pub fn role(&self) -> StaffRole {
        self.role
    }

    /// Returns when the session was opened.
    #[must_use]
    pub fn login_time(&self) -> DateTime<Utc> {
        self.login_time
    }
}
