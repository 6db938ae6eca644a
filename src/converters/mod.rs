//! Backend reply normalization
//!
//! - `prometheus`: matrix and label-value replies into the uniform model
//! - `loki`: raw pass-through and error message extraction

pub mod loki;
pub mod prometheus;
