pub mod server;

pub use server::{MonitorServer, MonitorState, build_router};
