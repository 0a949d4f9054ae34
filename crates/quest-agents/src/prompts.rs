//! Prompt construction for each role.
//!
//! Prompt text is not contractual — only the JSON shapes the prompts request
//! are, and those are pinned by `quest_mechanics::records`. Builders fold in
//! team status, quest framing, and species flavor so the reasoning service
//! has something concrete to write about.

use quest_mechanics::analysis::TeamStatus;
use quest_mechanics::records::EventCard;

use crate::context::{ResolutionFacts, TurnContext};

/// Preamble for the quest/event designer.
pub const DESIGNER_PREAMBLE: &str = "\
You design encounters for a creature-taming expedition game. You answer with \
a single JSON object and nothing else — no commentary, no code fences.";

/// Preamble for the choice designer.
pub const CHOICE_PREAMBLE: &str = "\
You design player options for a creature-taming expedition game. Offer \
meaningfully different tactics at different risk levels. You answer with a \
single JSON object and nothing else.";

/// Preamble for the narrator.
pub const NARRATOR_PREAMBLE: &str = "\
You narrate an expedition game in second person, present tense. Two or three \
sentences, vivid but tight. You answer with a single JSON object and nothing \
else.";

fn scene_header(ctx: &TurnContext<'_>) -> String {
    let status = TeamStatus::assess(ctx.team);
    let mut header = String::new();
    if let Some(quest) = ctx.quest {
        header.push_str(&format!(
            "Quest: {} — {} (step {} of {}, difficulty {})\n",
            quest.title,
            quest.objective,
            ctx.current_step + 1,
            quest.target_step_count,
            quest.difficulty,
        ));
    }
    header.push_str(&format!("Team: {}\n", status.digest()));
    if !ctx.style.is_empty() {
        header.push_str(&format!("Narrative style: {}\n", ctx.style));
    }
    if !ctx.flavor.is_empty() {
        header.push_str(&format!("Species notes: {}\n", ctx.flavor));
    }
    header
}

/// Prompt asking the designer for a quest framing.
pub fn quest_prompt(ctx: &TurnContext<'_>) -> String {
    format!(
        "{DESIGNER_PREAMBLE}\n\n{}\nInvent the quest this team is setting out on.\n\
         Reply with JSON: {{\"title\": string, \"objective\": string, \
         \"difficulty\": \"easy\"|\"normal\"|\"hard\", \"target_step_count\": integer}}",
        scene_header(ctx)
    )
}

/// Prompt asking the designer for the next event.
pub fn event_prompt(ctx: &TurnContext<'_>) -> String {
    format!(
        "{DESIGNER_PREAMBLE}\n\n{}\nCompose the next event the team runs into. \
         Wild creatures, hazards, and rival tamers are all fair game.\n\
         Reply with JSON: {{\"title\": string, \"description\": string, \
         \"event_type\": string, \"enemy_name\": string, \
         \"enemy_types\": [string], \"enemy_power\": number}}",
        scene_header(ctx)
    )
}

/// Prompt asking the choice designer for options against an event.
pub fn choices_prompt(ctx: &TurnContext<'_>, event: &EventCard) -> String {
    format!(
        "{CHOICE_PREAMBLE}\n\n{}\nEvent: {} — {}\nEnemy: {} (types {:?}, power {})\n\
         Offer exactly three choices ordered safest first.\n\
         Reply with JSON: {{\"choices\": [{{\"label\": string, \
         \"action_kind\": \"battle\"|\"capture\"|\"evade\", \
         \"risk\": \"safe\"|\"moderate\"|\"risky\", \"target_name\": string}}]}}",
        scene_header(ctx),
        event.title,
        event.description,
        event.enemy_name,
        event.enemy_types,
        event.enemy_power,
    )
}

/// Prompt asking the narrator to set the scene for an event.
pub fn scene_prompt(ctx: &TurnContext<'_>, event: &EventCard) -> String {
    format!(
        "{NARRATOR_PREAMBLE}\n\n{}\nEvent: {} — {}\nNarrate the moment the team \
         notices it. Do not resolve anything yet.\n\
         Reply with JSON: {{\"narration\": string, \"mood\": string, \
         \"followup_hook\": string}}",
        scene_header(ctx),
        event.title,
        event.description,
    )
}

/// Prompt asking the narrator to dress already-computed mechanical facts.
pub fn outcome_prompt(ctx: &TurnContext<'_>, facts: &ResolutionFacts) -> String {
    let verdict = match (facts.action, facts.success) {
        (_, true) => "succeeded",
        (_, false) => "failed",
    };
    format!(
        "{NARRATOR_PREAMBLE}\n\n{}\nThe player chose a {} {} against {} and it {}. \
         Damage dealt: {}. Score change: {}.\n\
         These facts are final — narrate them exactly, do not change numbers or \
         outcomes.\n\
         Reply with JSON: {{\"narration\": string, \"mood\": string, \
         \"followup_hook\": string}}",
        scene_header(ctx),
        facts.risk,
        facts.action,
        facts.enemy_name,
        verdict,
        facts.damage_dealt,
        facts.score_delta,
    )
}
