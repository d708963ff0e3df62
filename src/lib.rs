#![forbid(unsafe_code)]

// ordered map engine
pub mod rbtree;

// hashed map engine
pub mod hashmap;

pub use hashmap::ChainedHashMap;
pub use rbtree::RBTree;

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use simplelog::*;
    // tests race to initialize; whoever wins is fine
    let _ = TermLogger::init(
        LevelFilter::Trace,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}
