//! Built-in verb handlers.
//!
//! Handlers read the current line's operands and the action's params, mutate
//! the world, and report `Applied` or `Rejected`. Structural problems (missing
//! operands, unknown ids, off-board targets) are returned as errors.

use serde_json::{Map, Value};

use super::{ActionError, HandlerContext, HandlerOutcome};
use crate::constants::{DEFAULT_VARIABLE_TYPE, ENTITY_VALUE_KEY, META_POINTS_TO};
use crate::level::{AnnotatedLine, Operation};
use crate::numbers::{number_value, value_as_f64, value_as_index};
use crate::types::{CharacterTag, get_character_for_type};
use crate::world::{EntityDescriptor, EntityId, Position, WorldError, WorldState};

type HandlerResult = Result<HandlerOutcome, ActionError>;

fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn param_bool(params: &Map<String, Value>, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Read a `{row, col}` object or a `[row, col]` pair.
fn param_position(
    params: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<Position>, ActionError> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    let (row, col) = match raw {
        Value::Object(map) => (map.get("row"), map.get("col")),
        Value::Array(items) if items.len() == 2 => (items.first(), items.get(1)),
        Value::Null => return Ok(None),
        _ => (None, None),
    };
    match (row.and_then(value_as_index), col.and_then(value_as_index)) {
        (Some(row), Some(col)) => Ok(Some(Position::new(row, col))),
        _ => Err(ActionError::InvalidParam {
            name: key,
            reason: format!("expected a row/col position, got {raw}"),
        }),
    }
}

fn is_pointer_type(var_type: &str) -> bool {
    get_character_for_type(var_type) == CharacterTag::Pointer
}

/// Strip `&` and `*` from a call argument.
fn bare_name(arg: &str) -> &str {
    arg.trim().trim_start_matches(['&', '*']).trim()
}

/// Resolve a name to an entity: a bound variable first, then an entity id.
fn resolve_entity(world: &WorldState, name: &str) -> Result<EntityId, ActionError> {
    if let Some(entity) = world.resolve_binding(name) {
        return Ok(entity.id.clone());
    }
    if world.has_entity(name) {
        return Ok(name.to_string());
    }
    Err(WorldError::UnknownEntity(name.to_string()).into())
}

fn line_type(ctx: &HandlerContext<'_>, variable: &str) -> String {
    ctx.line
        .operand_str("type")
        .map(str::to_string)
        .or_else(|| {
            ctx.world
                .get_variable(variable)
                .map(|binding| binding.var_type.clone())
        })
        .unwrap_or_else(|| DEFAULT_VARIABLE_TYPE.to_string())
}

/// The value a line declares: `value`, or the initializer list of an array declaration.
fn declared_value(line: &AnnotatedLine) -> Option<&Value> {
    line.operands.get("value").or_else(|| match line.operation {
        Operation::ArrayDeclare => line.operands.get("values"),
        _ => None,
    })
}

fn sync_bound_entity(world: &mut WorldState, variable: &str, value: Value) -> Result<(), ActionError> {
    let Some(id) = world.resolve_binding(variable).map(|entity| entity.id.clone()) else {
        return Ok(());
    };
    world.set_entity_variable(&id, ENTITY_VALUE_KEY, value)?;
    Ok(())
}

/// Give a variable its value, creating or placing its unit as requested.
///
/// Pointer lines also link the pointer to the pointee's unit.
pub fn assign(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let line = ctx.line;
    let pointer_line = matches!(
        line.operation,
        Operation::PointerDeclare | Operation::PointerDeclareOnly
    ) || line.operands.contains_key("target");
    let variable = line
        .operand_str("variable")
        .or_else(|| line.operand_str("pointer"))
        .ok_or(ActionError::MissingOperand("variable"))?
        .to_string();
    let var_type = line_type(ctx, &variable);
    let entity_id = param_str(ctx.params, "entityId")
        .map_or_else(|| format!("entity-{variable}"), str::to_string);

    if !ctx.world.has_entity(&entity_id) {
        if !param_bool(ctx.params, "createIfMissing") {
            return Err(WorldError::UnknownEntity(entity_id).into());
        }
        let entity_type = param_str(ctx.params, "entityType").map_or_else(
            || get_character_for_type(&var_type).unit().to_string(),
            str::to_string,
        );
        ctx.world
            .add_entity(EntityDescriptor::new(entity_id.clone(), entity_type))?;
    }
    if let Some(target) = param_position(ctx.params, "target")? {
        ctx.world.place_entity_on_grid(&entity_id, target)?;
    }

    let value = ctx
        .params
        .get("value")
        .or_else(|| declared_value(line))
        .cloned()
        .or_else(|| {
            line.operand_str("target")
                .map(|target| Value::String(format!("&{target}")))
        })
        .unwrap_or(Value::Null);
    ctx.world.set_variable(&variable, &var_type, value.clone());
    ctx.world.bind_variable(&variable, &entity_id)?;
    ctx.world
        .set_entity_variable(&entity_id, ENTITY_VALUE_KEY, value)?;

    if pointer_line {
        link_pointer(ctx, &variable, &entity_id)?;
    }
    Ok(HandlerOutcome::applied())
}

/// Aim a pointer variable and its unit at the pointee's unit.
fn link_pointer(ctx: &mut HandlerContext<'_>, variable: &str, entity_id: &str) -> Result<(), ActionError> {
    let pointee = param_str(ctx.params, "pointsTo")
        .map(str::to_string)
        .or_else(|| {
            ctx.line
                .operand_str("target")
                .and_then(|target| ctx.world.resolve_binding(target))
                .map(|entity| entity.id.clone())
        });
    if let Some(pointee) = pointee {
        ctx.world.bind_variable(variable, &pointee)?;
        ctx.world
            .set_entity_metadata(entity_id, META_POINTS_TO, Value::String(pointee))?;
    }
    Ok(())
}

/// Exchange two units' positions and the values they carry.
pub fn swap(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let args: Vec<&str> = ctx
        .line
        .operands
        .get("args")
        .and_then(Value::as_array)
        .map(|args| args.iter().filter_map(Value::as_str).map(bare_name).collect())
        .unwrap_or_default();
    let pick = |key: &str, position: usize| {
        param_str(ctx.params, key)
            .or_else(|| ctx.line.operand_str(key))
            .map(bare_name)
            .or_else(|| args.get(position).copied())
    };
    let first = pick("first", 0)
        .ok_or(ActionError::MissingOperand("first"))?
        .to_string();
    let second = pick("second", 1)
        .ok_or(ActionError::MissingOperand("second"))?
        .to_string();

    let first_id = resolve_entity(ctx.world, &first)?;
    let second_id = resolve_entity(ctx.world, &second)?;
    ctx.world.swap_entities(&first_id, &second_id)?;

    let first_value = ctx.world.get_variable_value(&first).cloned();
    let second_value = ctx.world.get_variable_value(&second).cloned();
    if let (Some(a), Some(b)) = (first_value, second_value) {
        ctx.world.set_variable_value(&first, b)?;
        ctx.world.set_variable_value(&second, a)?;
    }

    let first_carried = carried_value(ctx.world, &first_id);
    let second_carried = carried_value(ctx.world, &second_id);
    if let Some(value) = second_carried {
        ctx.world
            .set_entity_variable(&first_id, ENTITY_VALUE_KEY, value)?;
    }
    if let Some(value) = first_carried {
        ctx.world
            .set_entity_variable(&second_id, ENTITY_VALUE_KEY, value)?;
    }
    Ok(HandlerOutcome::applied())
}

fn carried_value(world: &WorldState, id: &str) -> Option<Value> {
    world.get_entity(id).and_then(|entity| entity.value().cloned())
}

pub fn move_entity(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let entity_id = param_str(ctx.params, "entityId").ok_or(ActionError::MissingParam("entityId"))?;
    let target = param_position(ctx.params, "target")?.ok_or(ActionError::MissingParam("target"))?;
    ctx.world.move_entity(entity_id, target)?;
    Ok(HandlerOutcome::applied())
}

/// Follow a pointer. Writes change the pointee; reads copy it into a variable.
pub fn deref(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let pointer = ctx
        .line
        .operand_str("pointer")
        .ok_or(ActionError::MissingOperand("pointer"))?;
    let binding = ctx
        .world
        .get_variable(pointer)
        .ok_or_else(|| WorldError::UnknownVariable(pointer.to_string()))?;
    let Some(target) = binding
        .bound_to
        .as_deref()
        .filter(|id| ctx.world.has_entity(id))
        .map(str::to_string)
    else {
        return Ok(HandlerOutcome::rejected(format!(
            "`{pointer}` does not point at anything."
        )));
    };

    if ctx.line.operation == Operation::DerefRead {
        let variable = ctx
            .line
            .operand_str("variable")
            .ok_or(ActionError::MissingOperand("variable"))?
            .to_string();
        let value = ctx
            .world
            .get_entity(&target)
            .and_then(|entity| entity.value().cloned())
            .unwrap_or(Value::Null);
        let var_type = line_type(ctx, &variable);
        ctx.world.set_variable(&variable, &var_type, value.clone());
        sync_bound_entity(ctx.world, &variable, value)?;
        return Ok(HandlerOutcome::applied());
    }

    let value = ctx
        .params
        .get("value")
        .or_else(|| ctx.line.operands.get("value"))
        .cloned()
        .ok_or(ActionError::MissingOperand("value"))?;
    ctx.world
        .set_entity_variable(&target, ENTITY_VALUE_KEY, value.clone())?;
    for name in ctx.world.variables_bound_to(&target) {
        let pointer_var = ctx
            .world
            .get_variable(&name)
            .is_some_and(|binding| is_pointer_type(&binding.var_type));
        if !pointer_var {
            ctx.world.set_variable_value(&name, value.clone())?;
        }
    }
    Ok(HandlerOutcome::applied())
}

/// Take a unit from the tray and put it on the board.
pub fn place(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let requested_type = param_str(ctx.params, "itemType");
    let slot = match ctx.params.get("slot") {
        Some(raw) => Some(value_as_index(raw).ok_or_else(|| ActionError::InvalidParam {
            name: "slot",
            reason: format!("expected a tray index, got {raw}"),
        })?),
        None => requested_type.and_then(|item_type| ctx.world.find_tray_slot(item_type)),
    };
    let Some((slot, item)) = slot.and_then(|slot| {
        ctx.world
            .tray()
            .items()
            .get(slot)
            .map(|item| (slot, item.clone()))
    }) else {
        return Ok(HandlerOutcome::rejected("There is no matching unit in the tray."));
    };
    if let Some(requested) = requested_type
        && requested != item.item_type
    {
        return Ok(HandlerOutcome::rejected(format!(
            "Slot {slot} holds a {}, not a {requested}.",
            item.item_type
        )));
    }
    if ctx.world.is_on_cooldown(&item.item_type) {
        return Ok(HandlerOutcome::rejected(format!(
            "The {} is still cooling down.",
            item.item_type
        )));
    }
    let target = param_position(ctx.params, "target")?.ok_or(ActionError::MissingParam("target"))?;

    let declared = ctx.line.operation.is_declaration().then(|| {
        ctx.line
            .operand_str("variable")
            .or_else(|| ctx.line.operand_str("pointer"))
            .or_else(|| ctx.line.operand_str("array"))
    });
    let declared = declared.flatten().map(str::to_string);
    let entity_id = match (param_str(ctx.params, "entityId"), &declared) {
        (Some(id), _) => id.to_string(),
        (None, Some(variable)) => format!("entity-{variable}"),
        (None, None) => next_free_id(ctx.world, &item.item_type),
    };

    ctx.world.remove_from_tray(slot);
    let mut descriptor = EntityDescriptor::new(entity_id.clone(), item.item_type.clone()).at(target);
    descriptor.metadata = item.metadata;
    let value = declared_value(ctx.line).cloned();
    if let Some(value) = &value {
        descriptor
            .variables
            .insert(ENTITY_VALUE_KEY.to_string(), value.clone());
    }
    ctx.world.add_entity(descriptor)?;

    if let Some(ms) = ctx.params.get("cooldownMs").and_then(Value::as_i64) {
        ctx.world.set_cooldown(&item.item_type, ms);
    }
    if let Some(variable) = declared {
        let var_type = line_type(ctx, &variable);
        ctx.world
            .set_variable(&variable, &var_type, value.unwrap_or(Value::Null));
        ctx.world.bind_variable(&variable, &entity_id)?;
        if is_pointer_type(&var_type) {
            link_pointer(ctx, &variable, &entity_id)?;
        }
    }
    Ok(HandlerOutcome::applied())
}

fn next_free_id(world: &WorldState, item_type: &str) -> EntityId {
    (world.entity_count() + 1..)
        .map(|n| format!("{item_type}-{n}"))
        .find(|id| !world.has_entity(id))
        .unwrap_or_else(|| item_type.to_string())
}

pub fn remove(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let entity_id = param_str(ctx.params, "entityId").ok_or(ActionError::MissingParam("entityId"))?;
    if ctx.world.remove_entity(entity_id) {
        Ok(HandlerOutcome::applied())
    } else {
        Ok(HandlerOutcome::rejected(format!("There is no `{entity_id}` to remove.")))
    }
}

pub fn increment(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    step(ctx, 1)
}

pub fn decrement(ctx: &mut HandlerContext<'_>) -> HandlerResult {
    step(ctx, -1)
}

fn step(ctx: &mut HandlerContext<'_>, delta: i32) -> HandlerResult {
    let variable = param_str(ctx.params, "variable")
        .or_else(|| ctx.line.operand_str("variable"))
        .ok_or(ActionError::MissingOperand("variable"))?
        .to_string();
    let current = ctx
        .world
        .get_variable_value(&variable)
        .ok_or_else(|| WorldError::UnknownVariable(variable.clone()))?;
    let next = match current {
        Value::Number(n) if n.is_i64() => n
            .as_i64()
            .and_then(|value| value.checked_add(i64::from(delta)))
            .map(Value::from),
        other => value_as_f64(other).map(|value| number_value(value + f64::from(delta))),
    };
    let Some(next) = next else {
        return Ok(HandlerOutcome::rejected(format!(
            "`{variable}` does not hold a number."
        )));
    };
    ctx.world.set_variable_value(&variable, next.clone())?;
    sync_bound_entity(ctx.world, &variable, next)?;
    Ok(HandlerOutcome::applied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::level::parse_code_line;
    use serde_json::json;
    use std::sync::Arc;

    fn world() -> (WorldState, ManualClock) {
        let clock = ManualClock::starting_at(0);
        (WorldState::new(4, 4, 3, Arc::new(clock.clone())), clock)
    }

    fn run(
        handler: fn(&mut HandlerContext<'_>) -> HandlerResult,
        world: &mut WorldState,
        line: &AnnotatedLine,
        params: Value,
    ) -> HandlerResult {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut ctx = HandlerContext {
            world,
            line,
            params: &params,
        };
        handler(&mut ctx)
    }

    #[test]
    fn assign_creates_places_and_binds() {
        let (mut world, _) = world();
        let line = parse_code_line("int x = 5;", 0);
        let outcome = run(
            assign,
            &mut world,
            &line,
            json!({"target": {"row": 0, "col": 0}, "createIfMissing": true}),
        )
        .unwrap();
        assert_eq!(outcome, HandlerOutcome::applied());
        let entity = world.get_entity("entity-x").unwrap();
        assert_eq!(entity.entity_type, "catapult");
        assert_eq!(entity.position, Some(Position::new(0, 0)));
        assert_eq!(world.get_variable_value("x"), Some(&json!(5.0)));
        assert_eq!(world.get_variable("x").unwrap().bound_to.as_deref(), Some("entity-x"));
    }

    #[test]
    fn assign_without_entity_or_create_flag_errors() {
        let (mut world, _) = world();
        let line = parse_code_line("int x = 5;", 0);
        let err = run(assign, &mut world, &line, json!({})).unwrap_err();
        assert_eq!(err, ActionError::World(WorldError::UnknownEntity("entity-x".into())));

        let unknown = parse_code_line("mystery", 0);
        let err = run(assign, &mut world, &unknown, json!({})).unwrap_err();
        assert_eq!(err, ActionError::MissingOperand("variable"));
    }

    #[test]
    fn pointer_assign_links_to_pointee() {
        let (mut world, _) = world();
        let declare = parse_code_line("int x = 5;", 0);
        run(assign, &mut world, &declare, json!({"createIfMissing": true})).unwrap();
        let pointer = parse_code_line("int *p = &x;", 1);
        run(
            assign,
            &mut world,
            &pointer,
            json!({"createIfMissing": true, "target": [1, 1]}),
        )
        .unwrap();
        assert_eq!(world.get_entity("entity-p").unwrap().entity_type, "ballista");
        assert_eq!(world.get_variable("p").unwrap().bound_to.as_deref(), Some("entity-x"));
        assert_eq!(
            world.get_entity("entity-p").unwrap().metadata[META_POINTS_TO],
            json!("entity-x")
        );
        assert_eq!(world.get_variable_value("p"), Some(&json!("&x")));
    }

    #[test]
    fn deref_write_updates_pointee_and_plain_aliases() {
        let (mut world, _) = world();
        run(assign, &mut world, &parse_code_line("int x = 5;", 0), json!({"createIfMissing": true}))
            .unwrap();
        run(assign, &mut world, &parse_code_line("int *p = &x;", 1), json!({"createIfMissing": true}))
            .unwrap();
        run(deref, &mut world, &parse_code_line("*p = 9;", 2), json!({})).unwrap();
        assert_eq!(world.get_variable_value("x"), Some(&json!(9.0)));
        assert_eq!(world.get_entity("entity-x").unwrap().value(), Some(&json!(9.0)));
        assert_eq!(world.get_variable_value("p"), Some(&json!("&x")));

        run(deref, &mut world, &parse_code_line("int y = *p;", 3), json!({})).unwrap();
        assert_eq!(world.get_variable_value("y"), Some(&json!(9.0)));
    }

    #[test]
    fn deref_of_dangling_pointer_is_rejected() {
        let (mut world, _) = world();
        world.set_variable("p", "int*", json!(null));
        let outcome = run(deref, &mut world, &parse_code_line("*p = 1;", 0), json!({})).unwrap();
        assert!(matches!(outcome, HandlerOutcome::Rejected { .. }));
        let err = run(deref, &mut world, &parse_code_line("*q = 1;", 0), json!({})).unwrap_err();
        assert_eq!(err, ActionError::World(WorldError::UnknownVariable("q".into())));
    }

    #[test]
    fn swap_uses_call_arguments() {
        let (mut world, _) = world();
        world
            .add_entity(
                EntityDescriptor::new("entity-a", "catapult")
                    .at(Position::new(0, 0))
                    .with_variable("value", json!(1)),
            )
            .unwrap();
        world
            .add_entity(
                EntityDescriptor::new("entity-b", "catapult")
                    .at(Position::new(0, 1))
                    .with_variable("value", json!(2)),
            )
            .unwrap();
        world.set_variable("a", "int", json!(1));
        world.set_variable("b", "int", json!(2));
        world.bind_variable("a", "entity-a").unwrap();
        world.bind_variable("b", "entity-b").unwrap();

        let line = parse_code_line("Swap(&a, &b);", 0);
        run(swap, &mut world, &line, json!({})).unwrap();
        assert_eq!(world.get_entity("entity-a").unwrap().position, Some(Position::new(0, 1)));
        assert_eq!(world.get_variable_value("a"), Some(&json!(2)));
        assert_eq!(world.get_variable_value("b"), Some(&json!(1)));
        assert_eq!(world.get_entity("entity-a").unwrap().value(), Some(&json!(2)));

        let err = run(swap, &mut world, &line, json!({"first": "ghost"})).unwrap_err();
        assert_eq!(err, ActionError::World(WorldError::UnknownEntity("ghost".into())));
    }

    #[test]
    fn placing_an_initialized_array_keeps_its_elements() {
        let (mut world, _) = world();
        world.add_to_tray("barracks", Map::new());
        let line = parse_code_line("int arr[3] = {1, 2, 3};", 0);
        let outcome = run(
            place,
            &mut world,
            &line,
            json!({"itemType": "barracks", "target": [0, 0]}),
        )
        .unwrap();
        assert_eq!(outcome, HandlerOutcome::applied());
        assert_eq!(world.get_variable_value("arr"), Some(&json!([1.0, 2.0, 3.0])));
        let entity = world.get_entity("entity-arr").unwrap();
        assert_eq!(entity.value(), Some(&json!([1.0, 2.0, 3.0])));

        world.add_to_tray("barracks", Map::new());
        let bare = parse_code_line("int buf[4];", 1);
        run(place, &mut world, &bare, json!({"itemType": "barracks", "target": [1, 0]})).unwrap();
        assert_eq!(world.get_variable_value("buf"), Some(&Value::Null));
    }

    #[test]
    fn place_consumes_tray_and_applies_cooldown() {
        let (mut world, clock) = world();
        world.add_to_tray("catapult", Map::new());
        world.add_to_tray("catapult", Map::new());
        let line = parse_code_line("int x = 5;", 0);
        let outcome = run(
            place,
            &mut world,
            &line,
            json!({"itemType": "catapult", "target": {"row": 2, "col": 2}, "cooldownMs": 100}),
        )
        .unwrap();
        assert_eq!(outcome, HandlerOutcome::applied());
        assert_eq!(world.tray().len(), 1);
        assert_eq!(world.get_entity("entity-x").unwrap().position, Some(Position::new(2, 2)));
        assert_eq!(world.get_variable("x").unwrap().bound_to.as_deref(), Some("entity-x"));

        let again = run(
            place,
            &mut world,
            &parse_code_line("y = 1;", 1),
            json!({"itemType": "catapult", "target": [0, 0]}),
        )
        .unwrap();
        assert!(matches!(again, HandlerOutcome::Rejected { .. }));
        clock.advance(150);
        let later = run(
            place,
            &mut world,
            &parse_code_line("y = 1;", 1),
            json!({"slot": 0, "target": [0, 0]}),
        )
        .unwrap();
        assert_eq!(later, HandlerOutcome::applied());
        assert!(world.has_entity("catapult-2"));
    }

    #[test]
    fn placing_a_pointer_aims_it_at_the_target() {
        let (mut world, _) = world();
        world
            .add_entity(EntityDescriptor::new("entity-x", "catapult").at(Position::new(0, 0)))
            .unwrap();
        world.set_variable("x", "int", json!(5));
        world.bind_variable("x", "entity-x").unwrap();
        world.add_to_tray("ballista", Map::new());

        let line = parse_code_line("int *p = &x;", 1);
        let outcome = run(
            place,
            &mut world,
            &line,
            json!({"itemType": "ballista", "target": [0, 1]}),
        )
        .unwrap();
        assert_eq!(outcome, HandlerOutcome::applied());
        assert_eq!(world.resolve_binding("p").unwrap().id, "entity-x");
        assert_eq!(
            world.get_entity("entity-p").unwrap().metadata[META_POINTS_TO],
            json!("entity-x")
        );
    }

    #[test]
    fn place_rejects_missing_or_mismatched_slots() {
        let (mut world, _) = world();
        world.add_to_tray("scout", Map::new());
        let line = parse_code_line("char c = 'a';", 0);
        let missing = run(place, &mut world, &line, json!({"itemType": "catapult", "target": [0, 0]}))
            .unwrap();
        assert!(matches!(missing, HandlerOutcome::Rejected { .. }));
        let mismatched = run(
            place,
            &mut world,
            &line,
            json!({"slot": 0, "itemType": "catapult", "target": [0, 0]}),
        )
        .unwrap();
        assert!(matches!(mismatched, HandlerOutcome::Rejected { .. }));
        assert_eq!(world.tray().len(), 1);
    }

    #[test]
    fn step_handlers_require_numbers() {
        let (mut world, _) = world();
        world.set_variable("x", "int", json!(1));
        run(increment, &mut world, &parse_code_line("x++;", 0), json!({})).unwrap();
        assert_eq!(world.get_variable_value("x"), Some(&json!(2)));
        run(decrement, &mut world, &parse_code_line("--x;", 0), json!({})).unwrap();
        run(decrement, &mut world, &parse_code_line("x--;", 0), json!({})).unwrap();
        assert_eq!(world.get_variable_value("x"), Some(&json!(0)));

        world.set_variable("s", "char*", json!("hello"));
        let outcome = run(increment, &mut world, &parse_code_line("s++;", 0), json!({})).unwrap();
        assert!(matches!(outcome, HandlerOutcome::Rejected { .. }));
        let err = run(increment, &mut world, &parse_code_line("z++;", 0), json!({})).unwrap_err();
        assert_eq!(err, ActionError::World(WorldError::UnknownVariable("z".into())));
    }

    #[test]
    fn move_and_remove_need_entity_ids() {
        let (mut world, _) = world();
        world.add_entity(EntityDescriptor::new("a", "catapult")).unwrap();
        let line = parse_code_line("x = 1;", 0);
        run(move_entity, &mut world, &line, json!({"entityId": "a", "target": [3, 3]})).unwrap();
        assert_eq!(world.get_entity("a").unwrap().position, Some(Position::new(3, 3)));
        assert_eq!(
            run(move_entity, &mut world, &line, json!({"entityId": "a"})).unwrap_err(),
            ActionError::MissingParam("target")
        );
        assert_eq!(
            run(remove, &mut world, &line, json!({"entityId": "a"})).unwrap(),
            HandlerOutcome::applied()
        );
        assert!(matches!(
            run(remove, &mut world, &line, json!({"entityId": "a"})).unwrap(),
            HandlerOutcome::Rejected { .. }
        ));
    }
}
