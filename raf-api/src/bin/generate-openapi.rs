//! OpenAPI Specification Generator Binary
//!
//! Writes the RAF API OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p raf-api --bin generate-openapi > openapi.json

use raf_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
