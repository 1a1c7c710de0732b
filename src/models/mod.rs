pub mod citation;
pub mod claim;
pub mod fragment;

pub use citation::*;
pub use claim::*;
pub use fragment::*;
