//! One handler per subcommand.
//!
//! - **identity**: `init`, `import`
//! - **keys**: `unlock`, `lock`, `status`
//! - **logs**: `log`, `read`, `logs`, `use`, `merge`
//! - **files**: `encrypt`, `decrypt`
//! - **misc**: `completions`

pub mod files;
pub mod identity;
pub mod keys;
pub mod logs;
pub mod misc;
