#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Sparse (BM25) keyword index over one document's chunk set.

pub mod bm25;

pub use bm25::SparseIndex;
