pub mod http_client;
pub mod pacer;

pub use http_client::ReqwestPortal;
pub use pacer::Pacer;
