//! Closed enumerations shared across the engine.
//!
//! Everything here is a sealed, exhaustively matched set: intents, grades,
//! rarities, event categories, plot statuses. Dynamic dispatch over these
//! domains happens via `match`, never trait objects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game identity
// ---------------------------------------------------------------------------

/// The narrative system flavour chosen at game creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemType {
    /// A system-apocalypse world where an interface grants powers.
    SystemIntegration,
    /// Eastern-fantasy cultivation progression.
    CultivationPath,
    /// Die-and-retry temporal loop.
    DeathLoop,
    /// Classic dungeon crawling.
    DungeonDelve,
    /// Magic academy setting.
    ArcaneAcademy,
    /// Traditional tabletop fantasy.
    TabletopClassic,
    /// Long-form journey epic.
    EpicJourney,
    /// Slow-burn awakening of a chosen hero.
    HeroAwakening,
}

/// Difficulty selected at game creation. Influences combat tuning only;
/// never gates content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Forgiving damage and generous XP.
    Story,
    /// Baseline tuning.
    Balanced,
    /// Harsher damage, scarcer loot.
    Brutal,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Balanced
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Coarse progression tier derived from character level.
///
/// Grade gates class evolution and awards unspent stat points on each
/// promotion. The level bands are fixed:
///
/// | Grade | Levels |
/// |---|---|
/// | E | 1--25 |
/// | D | 26--75 |
/// | C | 76--150 |
/// | B | 151--250 |
/// | A | 251--400 |
/// | S | 401--1000 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Entry tier, levels 1--25.
    E,
    /// Levels 26--75.
    D,
    /// Levels 76--150.
    C,
    /// Levels 151--250.
    B,
    /// Levels 251--400.
    A,
    /// Apex tier, levels 401--1000.
    S,
}

impl Grade {
    /// Derive the grade from a character level.
    ///
    /// Levels below 1 are treated as 1; levels above 1000 stay S grade.
    pub const fn from_level(level: u32) -> Self {
        match level {
            0..=25 => Self::E,
            26..=75 => Self::D,
            76..=150 => Self::C,
            151..=250 => Self::B,
            251..=400 => Self::A,
            _ => Self::S,
        }
    }

    /// Unspent stat points awarded when a character first reaches this grade.
    ///
    /// Reaching E awards nothing (it is the starting tier).
    pub const fn stat_point_award(self) -> u32 {
        match self {
            Self::E => 0,
            Self::D => 10,
            Self::C => 20,
            Self::B => 30,
            Self::A => 50,
            Self::S => 100,
        }
    }

    /// How many levels the player must gain before the planner re-runs.
    pub const fn replan_stride(self) -> u32 {
        match self {
            Self::E => 5,
            Self::D => 10,
            Self::C => 15,
            Self::B => 20,
            Self::A => 25,
            Self::S => 40,
        }
    }

    /// Short display form (`"E-Grade"`).
    pub const fn label(self) -> &'static str {
        match self {
            Self::E => "E-Grade",
            Self::D => "D-Grade",
            Self::C => "C-Grade",
            Self::B => "B-Grade",
            Self::A => "A-Grade",
            Self::S => "S-Grade",
        }
    }
}

impl core::fmt::Display for Grade {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A base character attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    /// Physical power; scales physical damage.
    Strength,
    /// Agility and precision.
    Dexterity,
    /// Toughness; scales max HP growth.
    Constitution,
    /// Arcane aptitude; scales magical damage.
    Intelligence,
    /// Willpower; reduces incoming magical damage.
    Wisdom,
    /// Presence; gates dialogue and shop outcomes.
    Charisma,
    /// Flat damage mitigation against physical attacks.
    Defense,
}

impl Stat {
    /// All stats in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Strength,
        Self::Dexterity,
        Self::Constitution,
        Self::Intelligence,
        Self::Wisdom,
        Self::Charisma,
        Self::Defense,
    ];
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// Skill rarity tier. Scales damage output and XP gained per use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillRarity {
    /// Baseline skills every class can reach.
    Common,
    /// Slightly above baseline.
    Uncommon,
    /// Meaningful build-arounds.
    Rare,
    /// Strong signature skills.
    Epic,
    /// Near-unique powers.
    Legendary,
    /// One-of-a-kind system anomalies.
    Mythic,
}

impl SkillRarity {
    /// Damage multiplier applied to a skill effect's base power.
    pub fn power_multiplier(self) -> Decimal {
        match self {
            Self::Common => Decimal::ONE,
            Self::Uncommon => Decimal::new(12, 1),
            Self::Rare => Decimal::new(15, 1),
            Self::Epic => Decimal::TWO,
            Self::Legendary => Decimal::new(3, 0),
            Self::Mythic => Decimal::new(5, 0),
        }
    }

    /// Multiplier on the flat 10 XP awarded per skill use.
    pub const fn xp_multiplier(self) -> u64 {
        match self {
            Self::Common => 1,
            Self::Uncommon => 2,
            Self::Rare => 3,
            Self::Epic => 5,
            Self::Legendary => 8,
            Self::Mythic => 12,
        }
    }
}

/// Damage typing for skill effects. Decides which defensive formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Reduced by the target's defense stat.
    Physical,
    /// Reduced by the target's wisdom.
    Magical,
    /// Elemental school; mitigated like magical damage.
    Elemental,
    /// Weakly reduced by defense; usually arrives as damage over time.
    Poison,
    /// Ignores all mitigation.
    True,
}

/// What a skill may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// The caster.
    Caster,
    /// One hostile target.
    SingleEnemy,
    /// Every hostile target in the encounter.
    AllEnemies,
    /// One friendly target.
    Ally,
    /// Everything in an area, friend or foe.
    Area,
}

/// Broad skill grouping used for menus and insight classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    /// Damage dealing.
    Offense,
    /// Mitigation and shields.
    Defense,
    /// Heals, buffs, and restoration.
    Support,
    /// Non-combat utility.
    Utility,
    /// Mobility.
    Movement,
    /// Always-on stat aggregates.
    Passive,
}

/// Weapon families recognised by the action-insight classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    /// Blades.
    Sword,
    /// Hafted chopping weapons.
    Axe,
    /// Ranged bows.
    Bow,
    /// Casting foci.
    Staff,
    /// Short blades.
    Dagger,
    /// Bludgeons.
    Mace,
    /// Empty hands.
    Unarmed,
}

// ---------------------------------------------------------------------------
// Player intent
// ---------------------------------------------------------------------------

/// The classified intent behind one free-text player input.
///
/// Produced by the intent analyzer agent (with deterministic fallback
/// heuristics) and routed by the orchestrator's dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Attack something.
    Combat,
    /// Talk to an NPC.
    NpcDialogue,
    /// Ask the system interface a question.
    SystemQuery,
    /// Accept, progress, or turn in a quest.
    QuestAction,
    /// Choose a class.
    ClassSelection,
    /// Open the skill list.
    SkillMenu,
    /// Use a specific skill.
    UseSkill,
    /// Evolve a max-level skill.
    SkillEvolution,
    /// Fuse owned skills.
    SkillFusion,
    /// Open the status screen.
    StatusMenu,
    /// Open the inventory.
    InventoryMenu,
    /// Anything else: explore the world.
    Exploration,
}

impl Default for Intent {
    fn default() -> Self {
        Self::Exploration
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Category tag on every event log entry, used for filtered search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    /// Narrator prose.
    Narrative,
    /// Combat resolution.
    Combat,
    /// System notifications and menus.
    System,
    /// NPC conversation.
    Dialogue,
    /// Movement and discovery.
    Exploration,
    /// Game creation and planner output.
    Setup,
    /// Raw LLM invocation records.
    AiCall,
}

impl EventCategory {
    /// Stable storage string for the database column.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::Narrative => "narrative",
            Self::Combat => "combat",
            Self::System => "system",
            Self::Dialogue => "dialogue",
            Self::Exploration => "exploration",
            Self::Setup => "setup",
            Self::AiCall => "ai_call",
        }
    }

    /// Parse the storage string back into the enum.
    ///
    /// Unknown strings fall back to [`Self::System`] so a corrupt column
    /// never fails a load.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "narrative" => Self::Narrative,
            "combat" => Self::Combat,
            "dialogue" => Self::Dialogue,
            "exploration" => Self::Exploration,
            "setup" => Self::Setup,
            "ai_call" => Self::AiCall,
            _ => Self::System,
        }
    }
}

/// Importance level on an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventImportance {
    /// Routine detail.
    Low,
    /// Ordinary gameplay event.
    Normal,
    /// Must survive summarisation (deaths, invariant breaches, grade-ups).
    High,
}

impl EventImportance {
    /// Stable storage string for the database column.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    /// Parse the storage string back into the enum, defaulting to normal.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Normal,
        }
    }
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

/// Lifecycle status of a quest. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestStatus {
    /// Known but not yet accepted.
    NotStarted,
    /// Accepted and in progress.
    InProgress,
    /// All objectives complete. Terminal.
    Completed,
    /// Failed permanently. Terminal.
    Failed,
}

impl QuestStatus {
    /// Whether this status permits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Broad quest classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    /// Main storyline quest.
    Main,
    /// Optional side content.
    Side,
    /// Repeatable daily task.
    Daily,
    /// Secret quest revealed by specific actions.
    Hidden,
}

// ---------------------------------------------------------------------------
// Plot graph
// ---------------------------------------------------------------------------

/// Narrative function of a planned beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    /// Initial hook drawing the player in.
    Hook,
    /// Escalation of tension or stakes.
    Escalation,
    /// Major confrontation.
    Confrontation,
    /// Key revelation or twist.
    Revelation,
    /// Character development moment.
    CharacterMoment,
    /// Mystery to be unravelled.
    Mystery,
    /// Resolution of a storyline.
    Resolution,
}

/// Lifecycle status of a plot node.
///
/// Legal transitions: `Pending -> Triggered -> Completed | Abandoned`.
/// `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Scheduled, waiting on level and dependencies.
    Pending,
    /// Live in the narrative.
    Triggered,
    /// Played out. Terminal.
    Completed,
    /// Overtaken by events. Terminal.
    Abandoned,
}

impl NodeStatus {
    /// Whether this status permits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Triggered)
                | (Self::Triggered, Self::Completed | Self::Abandoned)
                | (Self::Pending, Self::Abandoned)
        )
    }

    /// Stable storage string for the database column.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Triggered => "triggered",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parse the storage string back into the enum, defaulting to pending.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "triggered" => Self::Triggered,
            "completed" => Self::Completed,
            "abandoned" => Self::Abandoned,
            _ => Self::Pending,
        }
    }
}

/// Relationship between two plot nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// The target may not trigger until the source completes.
    Dependency,
    /// The source plants hints for the target.
    Foreshadows,
    /// Mutually exclusive branches.
    Alternative,
    /// The target raises the stakes of the source.
    Escalates,
    /// Threads that run side by side.
    Parallel,
}

/// Grouping of plot threads by narrative register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadCategory {
    /// The spine of the campaign.
    MainArc,
    /// Personal growth of the player character or companions.
    CharacterArc,
    /// World-scale happenings independent of the player.
    WorldEvent,
    /// Long-running mysteries.
    MysteryArc,
    /// Self-contained side stories.
    SideArc,
}

/// The four perspective agents that propose plot content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveKind {
    /// Champions character-driven beats.
    Character,
    /// Champions world-building beats.
    World,
    /// Champions conflict and escalation.
    Conflict,
    /// Champions mysteries and foreshadowing.
    Mystery,
}

impl PerspectiveKind {
    /// All perspectives in dispatch order.
    pub const ALL: [Self; 4] = [Self::Character, Self::World, Self::Conflict, Self::Mystery];

    /// Weight of this agent's ratings when merging proposals.
    pub fn priority_weight(self) -> Decimal {
        match self {
            Self::Character => Decimal::ONE,
            Self::World | Self::Conflict => Decimal::new(9, 1),
            Self::Mystery => Decimal::new(8, 1),
        }
    }
}

/// How strongly the perspective agents agreed, derived from the fraction of
/// agents whose proposed nodes survived consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusType {
    /// Every contributing agent had a surviving node.
    Unanimous,
    /// More than half did.
    Majority,
    /// At least one did, but no majority.
    Split,
    /// Nothing survived.
    NoConsensus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_band_boundaries() {
        assert_eq!(Grade::from_level(1), Grade::E);
        assert_eq!(Grade::from_level(25), Grade::E);
        assert_eq!(Grade::from_level(26), Grade::D);
        assert_eq!(Grade::from_level(75), Grade::D);
        assert_eq!(Grade::from_level(76), Grade::C);
        assert_eq!(Grade::from_level(150), Grade::C);
        assert_eq!(Grade::from_level(151), Grade::B);
        assert_eq!(Grade::from_level(250), Grade::B);
        assert_eq!(Grade::from_level(251), Grade::A);
        assert_eq!(Grade::from_level(400), Grade::A);
        assert_eq!(Grade::from_level(401), Grade::S);
        assert_eq!(Grade::from_level(1000), Grade::S);
    }

    #[test]
    fn every_level_has_exactly_one_grade() {
        for level in 1..=1000 {
            let grade = Grade::from_level(level);
            let bands = [
                (Grade::E, 1, 25),
                (Grade::D, 26, 75),
                (Grade::C, 76, 150),
                (Grade::B, 151, 250),
                (Grade::A, 251, 400),
                (Grade::S, 401, 1000),
            ];
            let matching = bands
                .iter()
                .filter(|(_, lo, hi)| level >= *lo && level <= *hi)
                .count();
            assert_eq!(matching, 1, "level {level}");
            let (expected, _, _) = bands
                .iter()
                .find(|(_, lo, hi)| level >= *lo && level <= *hi)
                .copied()
                .unwrap_or((Grade::E, 1, 25));
            assert_eq!(grade, expected, "level {level}");
        }
    }

    #[test]
    fn grade_stat_point_awards() {
        assert_eq!(Grade::E.stat_point_award(), 0);
        assert_eq!(Grade::D.stat_point_award(), 10);
        assert_eq!(Grade::C.stat_point_award(), 20);
        assert_eq!(Grade::B.stat_point_award(), 30);
        assert_eq!(Grade::A.stat_point_award(), 50);
        assert_eq!(Grade::S.stat_point_award(), 100);
    }

    #[test]
    fn node_status_transitions() {
        assert!(NodeStatus::Pending.can_transition_to(NodeStatus::Triggered));
        assert!(NodeStatus::Triggered.can_transition_to(NodeStatus::Completed));
        assert!(NodeStatus::Triggered.can_transition_to(NodeStatus::Abandoned));
        assert!(NodeStatus::Pending.can_transition_to(NodeStatus::Abandoned));
        // Terminal states admit nothing.
        assert!(!NodeStatus::Completed.can_transition_to(NodeStatus::Triggered));
        assert!(!NodeStatus::Abandoned.can_transition_to(NodeStatus::Pending));
        // No skipping straight to completed.
        assert!(!NodeStatus::Pending.can_transition_to(NodeStatus::Completed));
    }

    #[test]
    fn quest_terminal_statuses() {
        assert!(!QuestStatus::NotStarted.is_terminal());
        assert!(!QuestStatus::InProgress.is_terminal());
        assert!(QuestStatus::Completed.is_terminal());
        assert!(QuestStatus::Failed.is_terminal());
    }

    #[test]
    fn intent_serialises_screaming_snake() {
        let json = serde_json::to_string(&Intent::NpcDialogue).unwrap_or_default();
        assert_eq!(json, "\"NPC_DIALOGUE\"");
        let back: Result<Intent, _> = serde_json::from_str("\"USE_SKILL\"");
        assert_eq!(back.ok(), Some(Intent::UseSkill));
    }

    #[test]
    fn default_intent_is_exploration() {
        assert_eq!(Intent::default(), Intent::Exploration);
    }

    #[test]
    fn perspective_weights_ordered() {
        assert!(
            PerspectiveKind::Character.priority_weight()
                > PerspectiveKind::Mystery.priority_weight()
        );
        assert_eq!(
            PerspectiveKind::World.priority_weight(),
            PerspectiveKind::Conflict.priority_weight()
        );
    }

    #[test]
    fn event_category_db_roundtrip() {
        for cat in [
            EventCategory::Narrative,
            EventCategory::Combat,
            EventCategory::System,
            EventCategory::Dialogue,
            EventCategory::Exploration,
            EventCategory::Setup,
            EventCategory::AiCall,
        ] {
            assert_eq!(EventCategory::from_db_str(cat.as_db_str()), cat);
        }
        assert_eq!(EventCategory::from_db_str("garbage"), EventCategory::System);
    }

    #[test]
    fn replan_strides_grow_with_grade() {
        assert_eq!(Grade::E.replan_stride(), 5);
        assert_eq!(Grade::S.replan_stride(), 40);
        assert!(Grade::D.replan_stride() < Grade::B.replan_stride());
    }
}
