use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::schemas::application::ApplicationResponse;

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) verified: bool,
    pub(crate) phone_number: String,
    pub(crate) role: UserRole,
    pub(crate) chickened_out: bool,
    pub(crate) reg_num: String,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            verified: user.verified,
            phone_number: user.phone_number,
            role: user.role,
            chickened_out: user.chickened_out,
            reg_num: user.reg_num,
            created_at: format_primitive(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UserDetailResponse {
    #[serde(flatten)]
    pub(crate) user: UserResponse,
    pub(crate) applications: Vec<ApplicationResponse>,
}
