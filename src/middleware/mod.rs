pub mod redirect;
pub mod response;
pub mod session;

pub use redirect::{attach_cookies, redirect_to_login};
pub use response::{ApiResponse, ApiResult};
pub use session::session_bridge_middleware;
