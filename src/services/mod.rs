pub mod image_reconciler;
pub mod location_migration;
