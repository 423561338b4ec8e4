// src/config/mod.rs

//! Configuration documents: the declarative YAML units the builder compiles.
//!
//! A document is a `controls` sequence of [`ControlBlock`]s plus an optional
//! named `templates` mapping. Documents are read-only once loaded and are
//! identified by their position in the include tree (directory segments +
//! filename).

pub mod model;
pub mod reader;

pub use model::{ConfigDocument, ControlBlock};
pub use reader::{ConfigReader, FileConfigReader};
