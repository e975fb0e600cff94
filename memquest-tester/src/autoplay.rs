use serde::Serialize;
use serde_json::json;

use memquest_game::level::Operation;
use memquest_game::{
    AnnotatedLine, GameStateManager, PlayerAction, Position, SaveStore, WorldState,
    get_character_for_type,
};

/// One executed action during a playthrough.
#[derive(Debug, Clone, Serialize)]
pub struct ActionLog {
    pub line_number: usize,
    pub code: String,
    pub verb: String,
    pub success: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayReport {
    pub level_id: String,
    pub line_count: usize,
    pub completed: bool,
    pub actions: Vec<ActionLog>,
    pub stopped_reason: Option<String>,
}

impl PlayReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.actions.iter().filter(|action| !action.success).count()
    }
}

fn declared_name(line: &AnnotatedLine) -> Option<&str> {
    line.operand_str("variable")
        .or_else(|| line.operand_str("pointer"))
        .or_else(|| line.operand_str("array"))
}

fn first_free_cell(world: &WorldState) -> Option<Position> {
    world
        .grid()
        .iter()
        .find(|(_, cell)| cell.entity_ids.is_empty())
        .map(|(position, _)| position)
}

/// Where a line wants `entity_id`, or a free cell if it is not on the board yet.
fn target_for(line: &AnnotatedLine, world: &WorldState, entity_id: &str) -> Option<Position> {
    if let Some(position) = line
        .expected_state
        .as_ref()
        .and_then(|expected| expected.entities.get(entity_id))
    {
        return Some(*position);
    }
    if world.has_entity(entity_id) {
        return None;
    }
    first_free_cell(world)
}

/// Pick the action a careful player would take for `line`.
#[must_use]
pub fn plan_action(line: &AnnotatedLine, world: &WorldState) -> Option<PlayerAction> {
    match &line.operation {
        Operation::Declare
        | Operation::DeclareOnly
        | Operation::PointerDeclare
        | Operation::PointerDeclareOnly
        | Operation::ArrayDeclare
        | Operation::Assign => {
            let name = declared_name(line)?;
            let entity_id = format!("entity-{name}");
            let target = target_for(line, world, &entity_id);
            let unit = get_character_for_type(line.operand_str("type").unwrap_or("int")).unit();

            let from_tray = line.operation.is_declaration()
                && !world.has_entity(&entity_id)
                && world.tray().find(unit).is_some();
            if from_tray || line.operation == Operation::ArrayDeclare {
                let target = target?;
                return Some(
                    PlayerAction::new("place")
                        .with_param("itemType", unit)
                        .with_param("target", json!({"row": target.row, "col": target.col})),
                );
            }
            let mut action = PlayerAction::new("assign").with_param("createIfMissing", true);
            if let Some(target) = target {
                action = action.with_param("target", json!({"row": target.row, "col": target.col}));
            }
            Some(action)
        }
        Operation::DerefRead | Operation::DerefWrite => Some(PlayerAction::new("deref")),
        Operation::Increment => Some(PlayerAction::new("increment")),
        Operation::Decrement => Some(PlayerAction::new("decrement")),
        Operation::Named(function) if function == "swap" => Some(PlayerAction::new("swap")),
        _ => None,
    }
}

/// Play the loaded level line by line, stopping at the first failed action.
pub async fn play_level<S>(manager: &mut GameStateManager<S>, max_actions: usize) -> PlayReport
where
    S: SaveStore,
{
    let (level_id, line_count) = manager
        .level()
        .map_or_else(|| (String::new(), 0), |level| (level.id.clone(), level.line_count()));
    let mut report = PlayReport {
        level_id,
        line_count,
        completed: false,
        actions: Vec::new(),
        stopped_reason: None,
    };

    while report.actions.len() < max_actions {
        if manager.is_level_complete() {
            break;
        }
        let Some((line, world)) = manager
            .tracker()
            .and_then(|tracker| tracker.current_line().cloned())
            .zip(manager.world())
        else {
            report.stopped_reason = Some("no active line".to_string());
            break;
        };
        let Some(action) = plan_action(&line, world) else {
            report.stopped_reason = Some(format!(
                "no strategy for `{}` on line {}",
                line.operation, line.line_number
            ));
            break;
        };

        log::debug!("line {}: playing `{}`", line.line_number, action.verb);
        let verb = action.verb.clone();
        let outcome = manager.execute_action_async(action).await;
        report.actions.push(ActionLog {
            line_number: line.line_number,
            code: line.code.clone(),
            verb,
            success: outcome.success,
            feedback: outcome.feedback.text.clone(),
        });
        if !outcome.success {
            report.stopped_reason = Some(outcome.feedback.text);
            break;
        }
    }

    report.completed = manager.is_level_complete();
    if !report.completed && report.stopped_reason.is_none() {
        report.stopped_reason = Some(format!("gave up after {max_actions} actions"));
    }
    report
}
