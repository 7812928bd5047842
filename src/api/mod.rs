pub mod http;
pub mod http_client;
pub mod memory;
pub mod traits;
pub mod types;

pub use http::HttpBackend;
pub use memory::{MemoryBackend, MemoryOp};
pub use traits::{ApiResult, Backend};
pub use types::{
    AuthData, CodeFormat, ConnectorInfo, NewPolicy, PolicyContentEntry, PolicyRecord,
    PolicyVersion, RawResponse, WorkflowConversion,
};
