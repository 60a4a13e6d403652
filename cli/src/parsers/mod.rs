mod identifiers;
pub use identifiers::{read_identifier_lines, IdentifierSet};
