//! List commands implementation

use crate::backends::available_backends;

/// List all supported backends
pub fn list_backends() {
    println!("Supported backends:");
    println!();
    for backend in available_backends() {
        println!("  {:8} - {}", backend.name, backend.description);
    }
}
