pub mod service;
pub mod types;

pub use service::ProxyService;
pub use types::{AnswerResult, Document, QueryRequest, Store, UploadFileRequest, UploadReceipt};
