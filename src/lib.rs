pub mod builtin;
pub mod context;
pub mod db;
pub mod def;
mod densemap;
pub mod eval;
pub mod hash;
pub mod load;
pub mod progress;
pub mod run;
pub mod target;
pub mod task;
pub mod trace;
pub mod work;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
