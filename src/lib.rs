pub mod encoder;
pub mod extractor;
pub mod script;
