use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{ApplicationStatus, Department, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) verified: bool,
    pub(crate) phone_number: String,
    pub(crate) role: UserRole,
    pub(crate) chickened_out: bool,
    pub(crate) reg_num: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Application {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) department: Department,
    pub(crate) submitted: bool,
    pub(crate) status: ApplicationStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Application joined with the applicant's display name.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ApplicationWithApplicant {
    #[sqlx(flatten)]
    pub(crate) application: Application,
    pub(crate) applicant_name: String,
}

/// One answer of an application together with the question it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub(crate) struct QaPair {
    pub(crate) id: String,
    pub(crate) question: String,
    pub(crate) answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Evaluation {
    pub(crate) id: String,
    pub(crate) application_id: String,
    pub(crate) evaluator_id: String,
    pub(crate) final_score: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AnswerEvaluation {
    pub(crate) id: String,
    pub(crate) evaluation_id: String,
    pub(crate) answer_id: String,
    pub(crate) rating: i16,
    pub(crate) looks_ai: bool,
    pub(crate) created_at: PrimitiveDateTime,
}
