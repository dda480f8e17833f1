//! Decal Core Types and Definitions
//!
//! This crate provides the foundational data model for Decal product
//! designs. It has no rendering logic and performs no I/O. It includes:
//!
//! - **Identifiers**: Generator-assigned layer identifiers ([`identifier::LayerId`])
//! - **Colors**: Color handling with CSS color support ([`color::Color`])
//! - **Geometry**: Basic geometric types ([`geometry`] module)
//! - **Layers**: Text, image and shape design elements ([`layer`] module)
//! - **Design**: The ordered layer list plus canvas metadata ([`design::Design`])
//! - **Image references**: Parsed layer image sources ([`image_ref::ImageReference`])

pub mod color;
pub mod design;
pub mod geometry;
pub mod identifier;
pub mod image_ref;
pub mod layer;
