// Module exports for pure logic
pub mod documents;     // Tab store mutation logic
pub mod editor_store;  // Persistence layer
pub mod events;        // WebSocket state bridge
pub mod export;        // PDF export proxy
