//! Command implementations for shodan-cli

pub mod alert;
pub mod crawler;
pub mod dns;
pub mod host;
pub mod info;
pub mod stream;
pub mod tools;

pub use alert::alert;
pub use crawler::{ports, protocols};
pub use dns::{resolve, reverse};
pub use host::{count, host, search};
pub use info::{account, info};
pub use stream::stream;
pub use tools::{headers, myip};
