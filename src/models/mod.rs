pub mod prometheus;
pub mod response;

pub use response::{NormalizedResponse, QueryResponse, QueryResponseData, ResultType};
