pub mod backend;
pub mod device_delegate;
pub mod mixer;
pub mod native;
