//! The runtime type system.
//!
//! Every payload crossing an edge carries a [`TypeDescriptor`]; values
//! are shared, type-erased, and immutable once stored. Conversions
//! between payload types go through the process-wide
//! [`converter registry`](convert::converters), and tuple-shaped outputs
//! register projection/composition hooks in the
//! [`tuple registry`](tuple).

pub mod convert;
pub mod descriptor;
pub mod tuple;
pub mod value;

pub use convert::{converters, ConverterRegistry};
pub use descriptor::TypeDescriptor;
pub use tuple::{register_tuple, tuple_entry, tuple_size, TupleEntry, TupleValue};
pub use value::Value;
