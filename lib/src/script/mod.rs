/// Declarations and the collections holding them
mod object;
pub use object::{ObjectCollection, ScriptObject};

/// Line based declaration recognition
mod declaration;
pub use declaration::{
    declaration_key, Declaration, DeclarationStyle, Recognizer, DEFAULT_EXCLUSIONS,
};

/// Directory walking and file scanning
mod scanner;
pub use scanner::{ScanError, ScanOutput, Scanner};
