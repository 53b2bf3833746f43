//! # sheetcalc-chain
//!
//! Dependency-chain construction for the sheetcalc calculation-order engine.
//!
//! Given a workbook of formula cells, defined names and tables, this crate
//! determines the order in which formulas must be calculated so that every
//! formula runs after everything it references. The traversal is iterative
//! and tokenization is memoized across builds through a caller-owned
//! [`TokenCache`].
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::Workbook;
//! use sheetcalc_chain::{ChainBuilder, MemoryTokenCache};
//!
//! let mut wb = Workbook::new();
//! let sheet = wb.add_sheet("Sheet1").unwrap();
//! let ws = wb.sheet_mut(sheet).unwrap();
//! ws.set_value("C1", 3.0).unwrap();
//! ws.set_formula("B1", "=C1*2").unwrap();
//! ws.set_formula("A1", "=B1+1").unwrap();
//!
//! let mut cache = MemoryTokenCache::new();
//! let chain = ChainBuilder::new(&mut cache).build_workbook(&mut wb).unwrap();
//!
//! // B1 is scheduled before A1
//! assert_eq!(chain.calc_order().count(), 2);
//! ```

pub mod builder;
pub mod cache;
pub mod chain;
pub mod error;
pub mod evaluate;
pub mod node;
pub mod resolver;
pub mod tokenizer;

// Re-exports for convenience
pub use builder::{ChainBuilder, ChainOptions};
pub use cache::{MemoryTokenCache, TokenCache};
pub use chain::DependencyChain;
pub use error::{ChainError, ChainResult};
pub use evaluate::LiveEvaluator;
pub use node::{FormulaCell, NodeId};
pub use resolver::{AddressTarget, CellContext, NameTarget};
pub use tokenizer::{tokenize, Token, TokenKind};
