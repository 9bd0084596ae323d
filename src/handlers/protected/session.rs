// handlers/protected/session.rs - GET /api/session

use crate::auth::SessionUser;
use crate::middleware::{ApiResponse, ApiResult};

/// Current caller as carried in the primary session
pub async fn whoami(user: SessionUser) -> ApiResult<SessionUser> {
    Ok(ApiResponse::success(user))
}
