pub mod downloads;
pub mod logtail;
pub mod network;
