pub mod commands;
pub mod document_parser;
pub mod errors;
pub mod model_store;
pub mod models;
pub mod normalizer;
pub mod pdf;
pub mod pdftotext;
pub mod repository;
pub mod sections;
pub mod service;
pub mod settings_store;
pub mod similarity;
pub mod summary;
pub mod vectorizer;
