//! # meshsim-host
//!
//! Coordinator-side loader for meshsim node libraries.
//!
//! One shared library per firmware flavor exports the `sim_*` C symbols
//! defined in `meshsim-api`. [`NodeLibrary`] loads a library and resolves
//! the full symbol table up front; [`HostNode`] wraps one created node in a
//! safe handle whose methods mirror the C API and destroys it on drop.
//!
//! ```no_run
//! use meshsim_host::{NodeFlavor, NodeLibrary, NodeSpec};
//!
//! let library = NodeLibrary::load(NodeFlavor::Repeater)?;
//! let spec = NodeSpec { name: "r1".into(), rng_seed: 7, ..Default::default() };
//! let mut node = library.create_node(&spec.to_config())?;
//! let result = node.step(1000, 1_700_000_000);
//! println!("yielded: {:?}", result.reason);
//! # Ok::<(), meshsim_host::LibraryError>(())
//! ```

mod library;
mod node;
mod spec;

pub use library::{LibraryError, NodeFlavor, NodeLibrary};
pub use node::HostNode;
pub use spec::NodeSpec;

pub use meshsim_api::{NodeConfig, StepResult, YieldReason};
