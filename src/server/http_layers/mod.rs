mod rate_limit;
mod requests_logging;

pub use rate_limit::{
    extract_user_id_for_rate_limit, rate_limit_error_handler, IpKeyExtractor,
    UserOrIpKeyExtractor, GLOBAL_PER_MINUTE, LOGIN_PER_MINUTE,
};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
