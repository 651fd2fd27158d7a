pub mod app;
pub mod sku;

pub use app::*;
pub use sku::*;
