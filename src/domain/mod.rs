pub mod brazil;
pub mod member;

pub use brazil::*;
pub use member::*;
