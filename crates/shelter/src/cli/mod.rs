//! # CLI Behavior
//!
//! This is **one possible UI client** for shelterapp, not the application itself.
//! Every invocation loads the roster from the store, runs one operation, and
//! renders its result. Roster changes reach the store as they are made, so
//! nothing is kept between invocations.
//!
//! For the overall architecture, see the crate-level documentation in [`crate`].
//!
//! ## Module Structure
//!
//! - `commands`: Entry point; logging, runtime and output
//! - `handlers`: One handler per subcommand, calling the API
//! - `render`: Output formatting (tables, colors, messages)
//! - `setup`: Argument parsing via clap
//! - `styles`: Terminal styles

mod commands;
mod handlers;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
