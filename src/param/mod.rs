//! Caller-supplied parameters: nodes, keys and advanced settings

mod advanced;
mod key;
pub mod keys;
mod node;

pub use advanced::{AdvancedParams, ConnectOptions, IVR_LE_FIRST};
pub use key::AttributeKey;
pub use node::DicomNode;
