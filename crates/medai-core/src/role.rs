use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role carried in access tokens and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Receptionist,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "receptionist" => Ok(Role::Receptionist),
            "patient" => Ok(Role::Patient),
            other => Err(CoreError::unknown_role(other)),
        }
    }
}

/// Roles that go through the staff approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Doctor,
    Receptionist,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        Role::from(*self).as_str()
    }

    /// Capitalized form used in audit details and error messages.
    pub fn title(&self) -> &'static str {
        match self {
            StaffRole::Doctor => "Doctor",
            StaffRole::Receptionist => "Receptionist",
        }
    }
}

impl From<StaffRole> for Role {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Doctor => Role::Doctor,
            StaffRole::Receptionist => Role::Receptionist,
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval state of a staff account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            other => Err(CoreError::unknown_status(other)),
        }
    }
}

/// Approval state of a patient portal account.
///
/// Persisted as a small integer: `0` pending, `1` approved, `-1` rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatientApproval {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PatientApproval {
    pub fn as_i16(&self) -> i16 {
        match self {
            PatientApproval::Pending => 0,
            PatientApproval::Approved => 1,
            PatientApproval::Rejected => -1,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PatientApproval::Approved)
    }
}

impl TryFrom<i16> for PatientApproval {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            0 => Ok(PatientApproval::Pending),
            1 => Ok(PatientApproval::Approved),
            -1 => Ok(PatientApproval::Rejected),
            other => Err(CoreError::unknown_status(other.to_string())),
        }
    }
}

impl Serialize for PatientApproval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.as_i16())
    }
}

impl<'de> Deserialize<'de> for PatientApproval {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = i16::deserialize(deserializer)?;
        PatientApproval::try_from(raw).map_err(serde::de::Error::custom)
    }
}
