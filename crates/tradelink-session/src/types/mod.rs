/*
[INPUT]:  Session data model and backend wire schema
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions for session state and API communication
[UPDATE]: When the data model or the backend schema changes
*/

pub mod models;
pub mod requests;
pub mod responses;

pub use models::*;
pub use requests::*;
pub use responses::*;
