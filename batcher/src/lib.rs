//! Request coalescing for batch lookup services.
//!
//! A [`BatchExecutor`] collects keys from many concurrent callers and resolves
//! them in batches through a [`Resolver`]. Callers track their own keys in a
//! [`ResultMap`], claim resolved values with [`BatchExecutor::grab`] and wait
//! for new arrivals on an [`ArrivalListener`].

mod buffer;
mod errors;
mod executor;
pub mod metrics_defs;
mod resolver;
mod result_map;
mod signal;
mod timer;

pub use buffer::ResultBuffer;
pub use errors::{BatcherError, ResolverError};
pub use executor::{BatchExecutor, BatchSettings};
pub use resolver::{PARAMS_SEPARATOR, Resolver, ResolverFn, join_keys, resolver_fn, split_keys};
pub use result_map::ResultMap;
pub use signal::{ArrivalListener, ArrivalSignal};
pub use timer::FlushTimer;
