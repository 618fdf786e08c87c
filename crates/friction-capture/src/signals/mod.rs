pub mod extractor;
pub mod postprocess;
pub mod rules;
