pub mod gateway;
pub mod lifecycle;
pub mod payload;
pub mod session;
