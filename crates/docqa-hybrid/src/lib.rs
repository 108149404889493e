#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Hybrid retrieval pipeline: score fusion, reranking, adaptive strategy
//! selection and the batch query orchestrator.

pub mod engine;
pub mod fusion;
pub mod rerank;
pub mod strategy;

pub use engine::{DocIndexes, PreparedBody, PreparedDocument, RetrievalEngine};
