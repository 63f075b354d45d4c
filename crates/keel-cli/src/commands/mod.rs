pub mod fetch;
pub mod import;
pub mod init;
pub mod schema;
