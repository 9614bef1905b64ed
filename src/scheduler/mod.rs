mod retention_engine;

pub use retention_engine::RetentionEngine;
