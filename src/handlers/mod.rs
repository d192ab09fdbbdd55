// handlers/mod.rs - route handlers grouped by surface
//
// content: the admin `/content-manager` overrides, one module per content type

pub mod content;
