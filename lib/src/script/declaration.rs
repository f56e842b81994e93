use std::collections::HashSet;

/// Reserved words that look like declarations at the right depth but are
/// really effects, triggers or fields of another object.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "#",
    "@",
    "modifier",
    "character_modifier",
    "if",
    "else",
    "elseif",
    "else_if",
    "\n",
    "can_have",
    "can_keep",
    "can_pass",
    "on_pass",
    "on_revoke",
    "should_start_with",
    "graphical_cultures",
    "pass_cost",
    "desc",
    "compatibility",
    "name",
    "opposites",
    "triggered_opinion",
    "icon",
    "random_list",
    "limit",
    "random",
    "potential",
    "abort",
    "chance",
    "on_potential",
    "on_start",
    "on_abort",
    "on_completion",
    "requires",
    "highlight",
    "allow",
    "bypass",
    "ai_chance",
    "trigger",
    "family",
    "male_names",
    "female_names",
    "stability",
    "raise_legion",
    "alternative_limit",
    "hidden_effect",
    "OR",
    "or",
    "prevented_by",
    "trigger_event",
    "current_ruler",
    "value",
    "bg",
];

/// Color literal prefixes accepted by [DeclarationStyle::NamedColor]
const COLOR_PREFIXES: [&str; 4] = ["rgb", "hsv360", "hsv", "hex"];

/// How declarations are spotted in the files of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclarationStyle {
    /// `key = {` at the configured depth, or a bare `key = value` at depth 0
    #[default]
    Assignment,
    /// `type name = widget` lines inside gui `types` blocks
    GuiType,
    /// `template name` lines in gui files
    GuiTemplate,
    /// `key = rgb { .. }` and friends, keeping the literal
    NamedColor,
}

/// A declaration recognized on a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub key: String,
    pub color: Option<String>,
}

/// Everything before the comment marker
fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(code, _)| code)
}

/// Everything before the first `=`
fn left_side(line: &str) -> &str {
    line.split_once('=').map_or(line, |(lhs, _)| lhs)
}

/// Indentation in tab equivalents, a tab or a run of four spaces counts as one
fn indentation(lhs: &str) -> usize {
    lhs.matches('\t').count() + lhs.matches("    ").count()
}

/// The declared key, the left side of the line without any spaces or tabs
pub fn declaration_key(line: &str) -> String {
    left_side(line)
        .chars()
        .filter(|c| *c != ' ' && *c != '\t')
        .collect()
}

/// Decides which lines of a file introduce a declaration.
///
/// The assignment rule is line based and knows nothing about nesting, it
/// only looks at how far the left side of a line is indented.
#[derive(Debug, Clone)]
pub struct Recognizer {
    level: usize,
    style: DeclarationStyle,
    exclusions: HashSet<String>,
}

impl Recognizer {
    /// Create a recognizer for the given depth with the default reserved words
    pub fn new(level: usize, style: DeclarationStyle) -> Self {
        Recognizer {
            level,
            style,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Add more reserved words
    pub fn with_exclusions<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(words.into_iter().map(Into::into));
        self
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn style(&self) -> DeclarationStyle {
        self.style
    }

    pub fn is_excluded(&self, word: &str) -> bool {
        self.exclusions.contains(word)
    }

    /// The assignment rule: does this line introduce a declaration.
    ///
    /// Either a block opener (`= {`) whose left side sits exactly at the
    /// configured depth, or, at depth 0 only, any unindented `key = value`.
    /// Reserved words are rejected by both branches.
    pub fn should_read(&self, line: &str) -> bool {
        let code = strip_comment(line);
        let lhs = left_side(code);
        if self.is_excluded(lhs.trim()) {
            return false;
        }
        if code.contains("= {") && indentation(lhs) == self.level {
            return true;
        }
        if self.level == 0 {
            if let Some((lhs, _)) = code.split_once('=') {
                let lhs = lhs.trim_end();
                if !lhs.contains('\t') && !lhs.contains(' ') {
                    return true;
                }
            }
        }
        false
    }

    /// Recognize a declaration on the given line
    pub fn recognize(&self, line: &str) -> Option<Declaration> {
        match self.style {
            DeclarationStyle::Assignment => {
                if !self.should_read(line) {
                    return None;
                }
                let key = declaration_key(line);
                if key.is_empty() {
                    None
                } else {
                    Some(Declaration { key, color: None })
                }
            }
            DeclarationStyle::GuiType => self.recognize_gui_type(line),
            DeclarationStyle::GuiTemplate => self.recognize_gui_template(line),
            DeclarationStyle::NamedColor => self.recognize_color(line),
        }
    }

    fn accept(&self, key: &str) -> Option<Declaration> {
        if key.is_empty() || self.is_excluded(key) {
            None
        } else {
            Some(Declaration {
                key: key.to_owned(),
                color: None,
            })
        }
    }

    fn recognize_gui_type(&self, line: &str) -> Option<Declaration> {
        let rest = strip_comment(line).trim_start().strip_prefix("type")?;
        if !rest.starts_with(char::is_whitespace) {
            // `types Name` opens a block, it does not declare anything
            return None;
        }
        let (name, _) = rest.split_once('=')?;
        let name = name.trim();
        if name.contains(char::is_whitespace) {
            return None;
        }
        self.accept(name)
    }

    fn recognize_gui_template(&self, line: &str) -> Option<Declaration> {
        let rest = strip_comment(line).trim_start().strip_prefix("template")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '{' || c == '=')
            .next()
            .unwrap_or("");
        self.accept(name)
    }

    fn recognize_color(&self, line: &str) -> Option<Declaration> {
        let code = strip_comment(line);
        let (lhs, rhs) = code.split_once('=')?;
        if indentation(lhs) != self.level {
            return None;
        }
        let key = lhs.trim();
        if key.contains(char::is_whitespace) {
            return None;
        }
        let rhs = rhs.trim();
        let after_prefix = COLOR_PREFIXES
            .iter()
            .find_map(|p| rhs.strip_prefix(p))
            .unwrap_or(rhs);
        if !after_prefix.trim_start().starts_with('{') {
            return None;
        }
        let literal = match rhs.find('}') {
            Some(end) => &rhs[..=end],
            None => rhs,
        };
        let mut declaration = self.accept(key)?;
        declaration.color = Some(literal.to_owned());
        Some(declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_at(level: usize, line: &str) -> Option<String> {
        Recognizer::new(level, DeclarationStyle::Assignment)
            .recognize(line)
            .map(|d| d.key)
    }

    #[test]
    fn test_bare_assignment() {
        assert_eq!(key_at(0, "my_value = 5"), Some("my_value".to_owned()));
        assert_eq!(key_at(0, "my_value=5"), Some("my_value".to_owned()));
        assert_eq!(key_at(0, "@scaled = 0.5"), Some("@scaled".to_owned()));
        // indented bare assignments are fields, not declarations
        assert_eq!(key_at(0, "\ticon = \"gfx/x.dds\""), None);
        assert_eq!(key_at(0, "    icon = \"gfx/x.dds\""), None);
        assert_eq!(key_at(1, "my_value = 5"), None);
    }

    #[test]
    fn test_block_levels() {
        for n in 0..4 {
            let tabs = format!("{}key_{} = {{", "\t".repeat(n), n);
            let spaces = format!("{}key_{} = {{", "    ".repeat(n), n);
            for level in 0..4 {
                let expected = (level == n).then(|| format!("key_{}", n));
                assert_eq!(key_at(level, &tabs), expected, "{:?} at {}", tabs, level);
                assert_eq!(key_at(level, &spaces), expected, "{:?} at {}", spaces, level);
            }
        }
    }

    #[test]
    fn test_reserved_words() {
        for word in DEFAULT_EXCLUSIONS.iter().filter(|w| !w.trim().is_empty()) {
            for level in 0..3 {
                let line = format!("{}{} = {{", "\t".repeat(level), word);
                assert_eq!(key_at(level, &line), None, "{:?}", line);
                assert_eq!(key_at(0, &format!("{} = yes", word)), None);
            }
        }
        let recognizer = Recognizer::new(0, DeclarationStyle::Assignment)
            .with_exclusions(["some_excluded_key"]);
        assert!(recognizer.recognize("some_excluded_key = {").is_none());
        assert!(recognizer.recognize("other_key = {").is_some());
    }

    #[test]
    fn test_comments() {
        assert_eq!(key_at(0, "# commented = {"), None);
        assert_eq!(key_at(1, "\t# commented = {"), None);
        assert_eq!(
            key_at(0, "building_x = { # the = sign here is ignored"),
            Some("building_x".to_owned())
        );
        assert_eq!(key_at(1, "\tname = { #= {"), None);
    }

    #[test]
    fn test_key_strips_whitespace() {
        assert_eq!(declaration_key("\t key_a \t= {"), "key_a");
        assert_eq!(declaration_key("a b = c"), "ab");
        // nothing on the left side yields no declaration
        assert_eq!(key_at(0, "= 5"), None);
    }

    #[test]
    fn test_gui_types() {
        let recognizer = Recognizer::new(0, DeclarationStyle::GuiType);
        assert_eq!(recognizer.recognize("types Buttons"), None);
        assert_eq!(
            recognizer.recognize("\ttype my_button = button {").map(|d| d.key),
            Some("my_button".to_owned())
        );
        assert_eq!(recognizer.recognize("\t# type hidden = button"), None);
        assert_eq!(recognizer.recognize("\ttypeface = arial"), None);
    }

    #[test]
    fn test_gui_templates() {
        let recognizer = Recognizer::new(0, DeclarationStyle::GuiTemplate)
            .with_exclusions(["you"]);
        assert_eq!(
            recognizer.recognize("template tooltip_box").map(|d| d.key),
            Some("tooltip_box".to_owned())
        );
        assert_eq!(
            recognizer.recognize("\ttemplate inline{").map(|d| d.key),
            Some("inline".to_owned())
        );
        assert_eq!(recognizer.recognize("template you"), None);
        assert_eq!(recognizer.recognize("using = tooltip_box"), None);
    }

    #[test]
    fn test_named_colors() {
        let recognizer = Recognizer::new(1, DeclarationStyle::NamedColor);
        let red = recognizer.recognize("\tred = rgb { 255 0 0 } # bright").unwrap();
        assert_eq!(red.key, "red");
        assert_eq!(red.color.as_deref(), Some("rgb { 255 0 0 }"));
        let teal = recognizer.recognize("\tteal = hsv360{ 180 50 50 }").unwrap();
        assert_eq!(teal.color.as_deref(), Some("hsv360{ 180 50 50 }"));
        let plain = recognizer.recognize("    grey = { 0.5 0.5 0.5 }").unwrap();
        assert_eq!(plain.color.as_deref(), Some("{ 0.5 0.5 0.5 }"));
        assert_eq!(recognizer.recognize("colors = {"), None);
        assert_eq!(recognizer.recognize("\tred = yes"), None);
        assert_eq!(recognizer.recognize("\t\tred = rgb { 1 2 3 }"), None);
    }
}
