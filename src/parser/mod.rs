pub mod information;
pub mod templates;

pub use information::{parse_information_block, InformationBlock};
