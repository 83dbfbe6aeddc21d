use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "userrole", rename_all = "snake_case")]
pub(crate) enum UserRole {
    SuperAdmin,
    Admin,
    Evaluator,
    Applicant,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::Admin => "admin",
            UserRole::Evaluator => "evaluator",
            UserRole::Applicant => "applicant",
        }
    }

    /// Everyone except applicants may review applications.
    pub(crate) fn is_staff(self) -> bool {
        !matches!(self, UserRole::Applicant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "department", rename_all = "snake_case")]
pub(crate) enum Department {
    Technical,
    SocialMedia,
    Design,
    Management,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "applicationstatus", rename_all = "snake_case")]
pub(crate) enum ApplicationStatus {
    PendingReview,
    UnderReview,
    Waitlisted,
    Accepted,
    Rejected,
}
