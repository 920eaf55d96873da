//! Relay-style connections: arguments, sort enforcement, cursors, page windows,
//! assembly and the end-to-end resolver

pub mod args;
pub mod assembler;
pub mod cursor;
pub mod resolver;
pub mod sort;
pub mod window;

pub use args::{ConnectionArgs, OrderBy, SortDirection};
pub use assembler::{Connection, Edge, PageInfo, TotalCount, connection_from_data};
pub use cursor::{Cursor, SeekDirection};
pub use resolver::ConnectionResolver;
pub use sort::{force_sort_by_unique, keyset_order};
pub use window::PageWindow;
