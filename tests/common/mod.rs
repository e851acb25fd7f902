mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from parkseg for tests
#[allow(unused_imports)]
pub use parkseg::config::Config;
#[allow(unused_imports)]
pub use parkseg::mask::ColorMapping;
#[allow(unused_imports)]
pub use parkseg::models::Color;
