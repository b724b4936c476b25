//! Route modules for the OCR Harness server

pub mod health;
pub mod logs;
