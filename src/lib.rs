pub mod assemble;
pub mod config;
pub mod encoder;
pub mod error;
pub mod image;
pub mod lexer;
pub mod mnemonic;
pub mod object;
pub mod operand;
pub mod report;
pub mod sink;
pub mod strings;
pub mod symbols;
pub mod unit;

pub use assemble::{assemble_file, assemble_source};
pub use config::AsmConfig;
pub use error::{AsmError, SourceLoc, Warning};
pub use image::{GlulxImage, Header, ImageError};
pub use object::{ObjectFile, Stage};
