pub mod access;
pub mod category;
pub mod error;
pub mod file;
pub mod password_reset;
pub mod session;
pub mod user;

pub use category::Category;
pub use error::ManafilesError;
pub use file::FileRecord;
pub use session::Session;
pub use user::User;
