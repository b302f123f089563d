pub mod constants;
pub mod frame;
pub mod pagers;
pub mod process;
pub mod rand_generator;
pub mod simulator;
pub mod utils;

// Re-export commonly used items for convenience
pub use process::{Process, ProcessStats, Pte, Vma};
pub use simulator::{Instruction, Simulator};
