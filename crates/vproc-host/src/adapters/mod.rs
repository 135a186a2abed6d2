pub mod resources;
pub mod traits;
