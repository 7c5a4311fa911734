//! Pictor Catalog Library
//!
//! Image catalog access contract with compare-and-swap versioning, the
//! in-memory reference implementation, and the display-order manager that
//! keeps each partition's ordering index dense under concurrent writers.

pub mod memory;
pub mod ordering;
pub mod traits;
pub mod view;

// Re-export commonly used types
pub use memory::InMemoryCatalog;
pub use ordering::{ConcurrencyStrategy, DisplayOrderManager, OrderingConfig};
pub use traits::{
    AllowAllEntityChecker, CasWrite, EntityExistenceChecker, ImageCatalog, OrderReservation,
    OrderWrite, StaticEntityChecker,
};
pub use view::main_image;
