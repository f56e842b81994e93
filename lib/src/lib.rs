/// Line based recognition of script declarations. Not a parser for the
/// script grammar: a declaration is spotted by how a single line looks.
///
/// ## Getting Started
///
/// A [script::Scanner] walks a root directory and collects every
/// declaration of one category into a [script::ObjectCollection].
///
/// ```rust
/// use victools_lib::script::{DeclarationStyle, Recognizer, Scanner};
///
/// let scanner = Scanner::new(
///     "common/buildings",
///     "txt",
///     Recognizer::new(0, DeclarationStyle::Assignment),
/// );
/// let output = scanner.scan("/path/to/game");
/// for object in &output.objects {
///     println!("{} at {}:{}", object.key(), object.path().display(), object.line());
/// }
/// ```
pub mod script;

/// Per category indexes, merged across the base game and the mods in load
/// order
pub mod index;

/// Persisting indexes between runs, and detecting when they went stale
pub mod cache;

/// Building many indexes at once
pub mod loader;

/// User configuration
pub mod settings;

/// The facade tying settings, loading and caching together.
///
/// ## Example
///
/// ```rust,no_run
/// use victools_lib::{session::Session, settings::Settings};
///
/// let settings = Settings::load("/path/to/settings.json").unwrap();
/// let mut session = Session::new(settings).unwrap();
/// session.load(&|category: &str| println!("{} done", category)).unwrap();
/// for (category, object) in session.find("building_iron_mine") {
///     println!("{}: {}:{}", category, object.path().display(), object.line());
/// }
/// ```
pub mod session;
