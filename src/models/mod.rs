pub mod outcome;
pub mod proxy;
pub mod retry;

pub use outcome::*;
pub use proxy::*;
pub use retry::*;
