//! Report rendering: Markdown/JSON breakdowns and CSV exports.

pub mod export;
pub mod generator;

pub use export::{responses_to_csv, safe_name};
pub use generator::{generate_json_report, generate_markdown_report};
