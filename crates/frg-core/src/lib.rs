//! # frg-core
//!
//! Diagnostic bridge between an editor and the Forge toolchain.
//!
//! The toolchain has no machine-readable diagnostics; it prints free-form
//! text on stderr. This crate:
//! - supervises toolchain processes, one live process per slot
//! - extracts locations from error text with an ordered grammar chain
//! - maps 1-indexed line/column locators onto document offsets
//! - publishes diagnostics with replace semantics, never letting a stale
//!   validation overwrite a newer one
//! - resolves locators in terminal text into navigable links
//!
//! Everything here is editor-agnostic. Documents are keyed by any identity
//! type `K` (a URI in the language server, a path string in the CLI).

pub mod check;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod link;
pub mod locator;
pub mod offsets;
pub mod output;
pub mod publish;
pub mod run;
pub mod scratch;
pub mod sequence;
pub mod supervisor;

pub use check::{CheckOutcome, Checker, Failure};
pub use config::BridgeConfig;
pub use diagnostics::{
    BridgeError, BridgeResult, Channel, Diagnostic, DiagnosticSource, Severity,
};
pub use document::{TextDocument, TextPosition, TextRange};
pub use link::{TerminalLink, resolve_link};
pub use locator::{LocationMatch, LocatorChain, LocatorKind};
pub use offsets::{OffsetRange, offset_range};
pub use output::OutputSink;
pub use publish::{DiagnosticSink, Publisher};
pub use run::{Navigator, RunOutcome, RunSession};
pub use scratch::{ScratchSpace, TempDirScratch};
pub use sequence::{SequenceToken, Sequencer, ValidationRequest};
pub use supervisor::{CommandSpec, ExitClass, Slot, Supervisor};
