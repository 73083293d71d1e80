//! Small cross-cutting helpers.

pub mod id_generator;
