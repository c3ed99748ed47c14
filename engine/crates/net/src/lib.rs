pub mod channels;
pub mod output_router;
pub mod rate_limiter;
pub mod web_server;
