pub mod batch;
pub mod cancel;
pub mod cloud;
pub mod config;
pub mod error;
pub mod objective;
pub mod optimizer;
pub mod transport;
pub mod vector;

pub use cancel::CancelToken;
pub use error::{AlignError, AlignResult};
pub use vector::Vector;
