pub mod header;
pub mod request_builder;
