pub mod memory;

pub use memory::MemoryStore;

pub mod prelude {
    pub use super::MemoryStore;
    pub use wd_core::store::*;
}
