use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::{ApplicationWithApplicant, QaPair};
use crate::db::types::{ApplicationStatus, Department};

#[derive(Debug, Serialize)]
pub(crate) struct ApplicationResponse {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) applicant_name: String,
    pub(crate) department: Department,
    pub(crate) submitted: bool,
    pub(crate) status: ApplicationStatus,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ApplicationResponse {
    pub(crate) fn from_db(row: ApplicationWithApplicant) -> Self {
        let ApplicationWithApplicant { application, applicant_name } = row;
        Self {
            id: application.id,
            user_id: application.user_id,
            applicant_name,
            department: application.department,
            submitted: application.submitted,
            status: application.status,
            created_at: format_primitive(application.created_at),
            updated_at: format_primitive(application.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QaPairResponse {
    pub(crate) answer_id: String,
    pub(crate) question: String,
    pub(crate) answer: String,
}

impl From<QaPair> for QaPairResponse {
    fn from(pair: QaPair) -> Self {
        Self { answer_id: pair.id, question: pair.question, answer: pair.answer }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplicationDetailResponse {
    #[serde(flatten)]
    pub(crate) application: ApplicationResponse,
    pub(crate) qa_pairs: Vec<QaPairResponse>,
}
