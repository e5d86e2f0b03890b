pub mod ports;

pub use ports::{Clock, ManualClock, PortalHttp, PortalResponse, SystemClock};
