/// Persistence for identity resolution
pub mod memory;
pub mod otps;
pub mod pg;
pub mod tx;
pub mod users;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use otps::{OtpRepository, PgOtpRepository};
pub use pg::{PgTransaction, PgTxBackend};
pub use tx::{Transaction, TxBackend, TxContext, TxManager};
pub use users::{PgUserRepository, UserRepository};
