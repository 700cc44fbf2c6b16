pub mod browse;
pub mod connection;
pub mod document;
pub mod query;

pub use browse::{CollectionsCommand, DatabasesCommand};
pub use connection::ConnectionArgs;
pub use document::{DeleteCommand, GetCommand};
pub use query::QueryCommand;
