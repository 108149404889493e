#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Dense (embedding-vector) similarity index for one document.

pub mod flat;

pub use flat::DenseIndex;
