//! Per-field extractors. None of them perform I/O: they read an already
//! fetched [`ClaimSet`](crate::claims::ClaimSet) or
//! [`InformationBlock`](crate::parser::InformationBlock).

pub mod claims;
pub mod image;

pub use claims::{extract_birth_date, extract_death_date, extract_sex};
pub use image::{extract_description, extract_image_year};
