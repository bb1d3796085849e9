// Built-in listing adapters

pub mod fixture;
pub mod html_product;
