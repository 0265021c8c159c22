mod core;
mod cors;
mod log;
mod session;

pub use core::Middleware;
pub use cors::CorsMiddleware;
pub use log::LogMiddleware;
pub use session::SessionMiddleware;
