pub mod daemon;
pub mod grant;
pub mod health;
pub mod init;
pub mod keys;
pub mod open;
pub mod seal;
pub mod version;

pub use daemon::Daemon;
pub use grant::Grant;
pub use health::Health;
pub use init::Init;
pub use keys::Keys;
pub use open::Open;
pub use seal::Seal;
pub use version::Version;
