//! Collection of adapters bridging callback-based sources to
//! [observables].
//!
//! [observables]: crate::Observable

pub mod stream;
pub mod unmarshal;
