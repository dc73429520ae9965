//! Strategy detection for order metadata.
//! Decoding failures are absorbed here: they read as "not a DSF order" with no parameters.

pub mod dsf;
pub mod meta;

pub use dsf::{classify, extract_parameters, StrategyParameters};
pub use meta::{decode_hex, program_source};
