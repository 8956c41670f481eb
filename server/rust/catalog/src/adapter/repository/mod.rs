pub mod drink_memory;

pub use drink_memory::InMemoryDrinkRepository;
