// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the problem:
// reading-comprehension examples and where they come from.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, and traits

// A question / context / answer triple located by character offset
pub mod qa_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;
