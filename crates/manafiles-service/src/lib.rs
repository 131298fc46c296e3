pub mod credentials;
mod http;
mod local;
mod reset;
mod traits;

pub use http::HttpService;
pub use local::LocalService;
pub use reset::{LogCodeSender, ResetCodeSender};
pub use traits::{FileService, ServiceError, UploadFile};
