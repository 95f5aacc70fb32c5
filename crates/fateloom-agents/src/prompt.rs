//! Prompt template rendering via `minijinja`.
//!
//! Templates are embedded at compile time from the crate's `templates/`
//! directory, so the engine ships as one binary with no asset lookup.
//! Context is assembled as a `serde_json::Value` by each specialised
//! agent.

use minijinja::Environment;

use crate::error::AgentError;

/// Template names known to the engine.
pub mod names {
    /// The narrator's turn prompt.
    pub const NARRATOR: &str = "narrator";
    /// Intent classification.
    pub const INTENT: &str = "intent";
    /// NPC generation.
    pub const NPC_GEN: &str = "npc_gen";
    /// Location generation.
    pub const LOCATION_GEN: &str = "location_gen";
    /// Quest generation.
    pub const QUEST_GEN: &str = "quest_gen";
    /// Perspective proposal.
    pub const PERSPECTIVE: &str = "perspective";
    /// System identity definition.
    pub const SYSTEM_DEFINER: &str = "system_definer";
}

/// Manages the embedded prompt templates.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Build the engine with every embedded template registered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] if any embedded template fails to
    /// compile (a build-time content bug, caught by the constructor test).
    pub fn new() -> Result<Self, AgentError> {
        let mut env = Environment::new();
        let register = |env: &mut Environment<'static>, name: &'static str, source: &'static str| {
            env.add_template(name, source)
                .map_err(|e| AgentError::Template(format!("failed to add {name}: {e}")))
        };
        register(&mut env, names::NARRATOR, include_str!("../templates/narrator.j2"))?;
        register(&mut env, names::INTENT, include_str!("../templates/intent.j2"))?;
        register(&mut env, names::NPC_GEN, include_str!("../templates/npc_gen.j2"))?;
        register(
            &mut env,
            names::LOCATION_GEN,
            include_str!("../templates/location_gen.j2"),
        )?;
        register(&mut env, names::QUEST_GEN, include_str!("../templates/quest_gen.j2"))?;
        register(
            &mut env,
            names::PERSPECTIVE,
            include_str!("../templates/perspective.j2"),
        )?;
        register(
            &mut env,
            names::SYSTEM_DEFINER,
            include_str!("../templates/system_definer.j2"),
        )?;
        Ok(Self { env })
    }

    /// Render one template with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] if the template is missing or the
    /// render fails.
    pub fn render(&self, name: &str, context: &serde_json::Value) -> Result<String, AgentError> {
        self.env
            .get_template(name)
            .map_err(|e| AgentError::Template(format!("missing template {name}: {e}")))?
            .render(context)
            .map_err(|e| AgentError::Template(format!("{name} render failed: {e}")))
    }
}
