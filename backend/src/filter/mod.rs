//! Client filter DSL and its normalized, storage-facing form
//!
//! ```json
//! {
//!   "lastName": "Doe",
//!   "firstName__gte": "J",
//!   "author__filter": { "name__starts_with": "U" },
//!   "OR": [{ "year__lt": 1970 }, { "id__pre_filter": { "classics": true } }]
//! }
//! ```

pub mod compiler;
pub mod normalized;
pub mod operator;

pub use compiler::{AND_KEY, FilterCompiler, FilterPath, OR_KEY};
pub use normalized::{Constraint, NormalizedFilter};
pub use operator::{
    Comparison, FilterOperator, NO_RESULT_SYMBOL, OPERATOR_DELIMITER, SplitKey,
    split_attribute_and_filter_operator, split_filter_key,
};
