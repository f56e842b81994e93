use crate::script::{DeclarationStyle, Recognizer, Scanner};

/// Template words that are english prose in tooltips rather than templates
const GUI_TEMPLATE_EXCLUSIONS: [&str; 7] = ["inside", "you", "can", "but", "on", "within", "names"];

/// Customizable localization files in languages other than english
const FOREIGN_CUSTOM_LOC: [&str; 6] = [
    "99_ru_custom_loc.txt",
    "99_de_custom_loc.txt",
    "99_pl_custom_loc.txt",
    "99_fr_custom_loc.txt",
    "99_es_custom_loc.txt",
    "99_br_custom_loc.txt",
];

/// A kind of game object, and where and how its declarations are found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    path: String,
    level: usize,
    extension: String,
    style: DeclarationStyle,
    ignored: Vec<String>,
    included: Vec<String>,
    exclusions: Vec<String>,
}

impl Category {
    /// A category of top level declarations in the `.txt` files under `path`
    pub fn new<N: Into<String>, P: Into<String>>(name: N, path: P) -> Self {
        Category {
            name: name.into(),
            path: path.into(),
            level: 0,
            extension: "txt".to_owned(),
            style: DeclarationStyle::Assignment,
            ignored: Vec::new(),
            included: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// A category found in `.gui` files
    pub fn gui<N: Into<String>, P: Into<String>>(
        name: N,
        path: P,
        style: DeclarationStyle,
    ) -> Self {
        Category::new(name, path)
            .with_extension("gui")
            .with_style(style)
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    pub fn with_extension<E: Into<String>>(mut self, extension: E) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_style(mut self, style: DeclarationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn ignoring<I: IntoIterator<Item = S>, S: Into<String>>(mut self, files: I) -> Self {
        self.ignored.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn including<I: IntoIterator<Item = S>, S: Into<String>>(mut self, files: I) -> Self {
        self.included.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn excluding<I: IntoIterator<Item = S>, S: Into<String>>(mut self, words: I) -> Self {
        self.exclusions.extend(words.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sub-path, relative to a root, the category lives under
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn style(&self) -> DeclarationStyle {
        self.style
    }

    /// A scanner configured for this category
    pub fn scanner(&self) -> Scanner {
        let recognizer = Recognizer::new(self.level, self.style)
            .with_exclusions(self.exclusions.iter().cloned());
        Scanner::new(self.path.as_str(), self.extension.as_str(), recognizer)
            .ignoring(self.ignored.iter().cloned())
            .including(self.included.iter().cloned())
    }
}

/// Every category the Victoria 3 index knows about
pub fn victoria3() -> Vec<Category> {
    let common = |name: &str, dir: &str| Category::new(name, format!("common/{}", dir));
    vec![
        common("ai_strats", "ai_strategies"),
        common("alert_group", "alert_groups"),
        common("battle_conditions", "battle_conditions"),
        common("bgs", "building_groups"),
        common("buildings", "buildings"),
        common("canals", "canals"),
        common("char_template", "character_templates"),
        common("char_traits", "character_traits"),
        common("combat_unit_group", "combat_unit_groups"),
        common("combat_unit_type", "combat_unit_types"),
        common("commander_orders", "commander_orders"),
        common("commander_ranks", "commander_ranks"),
        common("companies", "company_types"),
        common("countries", "country_definitions"),
        common("country_ranks", "country_ranks"),
        common("country_types", "country_types"),
        common("culture_graphics", "culture_graphics"),
        common("cultures", "cultures"),
        common("custom_loc", "customizable_localization").ignoring(FOREIGN_CUSTOM_LOC),
        common("decrees", "decrees"),
        common("diplo_actions", "diplomatic_actions"),
        common("diplo_cat", "diplomatic_catalysts"),
        common("diplo_plays", "diplomatic_plays"),
        common("discrimination_traits", "discrimination_traits"),
        common("game_rules", "game_rules"),
        common("goods", "goods"),
        common("gov_types", "government_types"),
        Category::gui("gui_templates", "gui", DeclarationStyle::GuiTemplate)
            .excluding(GUI_TEMPLATE_EXCLUSIONS),
        Category::gui("gui_types", "gui", DeclarationStyle::GuiType),
        common("ideologies", "ideologies"),
        common("ig_traits", "interest_group_traits"),
        common("igs", "interest_groups"),
        common("institutions", "institutions"),
        common("jes", "journal_entries"),
        common("law_groups", "law_groups"),
        common("laws", "laws"),
        common("mobilization_options", "mobilization_options"),
        common("modifier_types", "modifier_type_definitions"),
        common("mods", "static_modifiers").ignoring(["00_code_static_modifiers.txt"]),
        common("named_colors", "named_colors")
            .with_level(1)
            .with_style(DeclarationStyle::NamedColor),
        common("parties", "parties"),
        common("pm_groups", "production_method_groups"),
        common("pms", "production_methods"),
        common("pop_needs", "pop_needs"),
        common("pop_types", "pop_types"),
        common("proposal_types", "proposal_types"),
        common("religions", "religions"),
        common("script_values", "script_values"),
        common("scripted_effects", "scripted_effects"),
        common("scripted_gui", "scripted_guis"),
        common("scripted_modifiers", "scripted_modifiers"),
        common("scripted_triggers", "scripted_triggers"),
        Category::new("state_regions", "map_data/state_regions"),
        common("state_traits", "state_traits"),
        common("strategic_regions", "strategic_regions"),
        common("subject_types", "subject_types"),
        common("technologies", "technology"),
        common("terrain_label", "labels"),
        common("terrains", "terrain"),
        common("messages", "messages"),
        common("objectives", "objectives"),
        common("objective_subgoal", "objective_subgoals"),
        common("political_lobby", "political_lobbies"),
        common("political_lobby_appeasement", "political_lobby_appeasement"),
        common("pb_identity", "power_bloc_identities"),
        common("pb_principle_group", "power_bloc_principle_groups"),
        common("pb_principle", "power_bloc_principles"),
        common("scripted_progress_bar", "scripted_progress_bars"),
    ]
}

/// Find a category by name
pub fn find<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.name == name)
}
