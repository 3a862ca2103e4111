//! On-disk record definitions for BSP files.

pub mod lump;
pub mod models;
pub mod nodes;
pub mod texture;
pub mod util;
pub mod visdata;
