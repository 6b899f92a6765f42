//! # infra_synth
//!
//! Stack assembly and synthesis for infrakit.
//!
//! A [`StackManifest`] lists the units of a stack: which template each one
//! resolves, which resource kind it maps onto, which secret it needs and
//! which units it follows. [`StackAssembler`] turns a manifest into an
//! ordered [`infra_core::DependencyGraph`]; [`AssembledStack::synthesize`]
//! walks that graph with a [`CloudAssemblyAdapter`] and writes a
//! CloudFormation template plus the synthesis log.
//!
//! A unit whose secret is absent is skipped with a warning. Units that
//! followed it are re-attached to its own predecessors.

pub mod assembler;
pub mod cloud_assembly;
pub mod error;
pub mod manifest;

pub use assembler::{AssembledStack, SkippedUnit, StackAssembler, SynthesisOutput, MANIFEST_FILE, STACK_KEY};
pub use cloud_assembly::{CloudAssemblyAdapter, RESOURCES_ATTRIBUTE};
pub use error::{SynthError, SynthResult};
pub use manifest::{SecretSchema, SecretSpec, StackManifest, UnitSpec};
