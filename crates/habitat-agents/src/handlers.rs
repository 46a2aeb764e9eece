//! Per-action handlers.
//!
//! Each handler validates its intent, checks preconditions against the
//! [`HandlerContext`], and returns an [`ActionResult`] of proposed changes
//! and event drafts. Nothing here touches the store; the tick engine
//! commits successful results atomically per agent.
//!
//! Gather is the one two-step action: the handler proposes a
//! [`HarvestRequest`] and the engine performs the store's atomic harvest,
//! then calls [`finalize_gather`] with whatever was actually granted.

use habitat_types::{
    ActionChanges, ActionIntent, ActionParams, ActionResult, Agent, AgentId, AgentLifeState,
    AgentPatch, ClaimType, DiscoveryType, EventDraft, EventType, HarmIntensity, HarvestRequest,
    InfoType, ItemType, KnowledgeProvenance, KnowledgeUpdate, MemoryEntry, MemoryKind,
    ResourceKind, VITAL_MAX,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::conflict::{self, CONTACT_RANGE, DECEIVE_RANGE};
use crate::context::HandlerContext;
use crate::costs::{
    self, effective_cost, vitals_multiplier, ActionConfig, CLAIM_BASE_COST, CONSUME_BASE_COST,
    DECEIVE_BASE_COST, DECEIVE_REPUTATION_PENALTY, NAME_LOCATION_BASE_COST, SHARE_INFO_BASE_COST,
    STEAL_BASE_COST, STEAL_REPUTATION_PENALTY, TRADE_BASE_COST, TRADE_SENTIMENT_GAIN,
    WORK_COST_PER_DURATION, WORK_HUNGER_PER_DURATION,
};
use crate::validation::validate_params;

/// Dispatch an intent to its handler.
///
/// The actor must be alive and not mid-sleep (sleeping agents are excluded
/// from the decision phase, but external submissions can still race a nap).
pub fn handle_intent(
    intent: &ActionIntent,
    agent: &Agent,
    ctx: &HandlerContext,
    config: &ActionConfig,
) -> ActionResult {
    if !agent.is_alive() {
        return ActionResult::fail("Agent is dead");
    }
    if agent.state == AgentLifeState::Sleeping
        && !matches!(intent.decision.params, ActionParams::Sleep { .. })
    {
        return ActionResult::fail("Agent is sleeping");
    }
    if let Err(reason) = validate_params(&intent.decision.params) {
        return ActionResult::fail(reason);
    }

    match &intent.decision.params {
        ActionParams::Move { to_x, to_y } => handle_move(agent, *to_x, *to_y, ctx, config),
        ActionParams::Buy {
            item_type,
            quantity,
        } => handle_buy(agent, *item_type, *quantity, ctx, config),
        ActionParams::Consume { item_type } => handle_consume(agent, *item_type, ctx, config),
        ActionParams::Sleep { duration } => handle_sleep(agent, *duration, ctx),
        ActionParams::Work { duration } => handle_work(agent, *duration, ctx, config),
        ActionParams::Gather {
            resource_type,
            quantity,
        } => handle_gather(agent, *resource_type, *quantity, ctx),
        ActionParams::Trade {
            target_agent_id,
            offer_item,
            offer_quantity,
            request_item,
            request_quantity,
        } => handle_trade(
            agent,
            *target_agent_id,
            *offer_item,
            *offer_quantity,
            *request_item,
            *request_quantity,
            ctx,
        ),
        ActionParams::Harm {
            target_agent_id,
            intensity,
        } => handle_harm(agent, *target_agent_id, *intensity, ctx),
        ActionParams::Steal {
            target_agent_id,
            item_type,
        } => handle_steal(agent, *target_agent_id, *item_type, ctx),
        ActionParams::Deceive {
            target_agent_id,
            claim,
            claim_type,
        } => handle_deceive(agent, *target_agent_id, claim, *claim_type, ctx),
        ActionParams::ShareInfo {
            target_agent_id,
            subject_agent_id,
            info_type,
            sentiment,
        } => handle_share_info(
            agent,
            *target_agent_id,
            *subject_agent_id,
            *info_type,
            *sentiment,
            ctx,
        ),
        ActionParams::Claim {} => handle_claim(agent, ctx),
        ActionParams::NameLocation { name } => handle_name_location(agent, name, ctx),
    }
}

/// Check the effective energy cost against the actor's current energy.
///
/// Returns the cost on success, the rejection reason otherwise.
fn charge_energy(agent: &Agent, base: u32) -> Result<u32, String> {
    let cost = effective_cost(base, vitals_multiplier(agent));
    if agent.energy < f64::from(cost) {
        return Err(String::from("Not enough energy"));
    }
    Ok(cost)
}

/// A memory of something the actor did at its current cell.
fn action_memory(agent: &Agent, tick: u64, detail: String) -> (AgentId, MemoryEntry) {
    (
        agent.id,
        MemoryEntry {
            tick,
            kind: MemoryKind::Action,
            x: agent.x,
            y: agent.y,
            detail,
        },
    )
}

/// A memory pinned to an agent other than the actor.
fn memory_for(
    agent_id: AgentId,
    kind: MemoryKind,
    x: i32,
    y: i32,
    tick: u64,
    detail: String,
) -> (AgentId, MemoryEntry) {
    (
        agent_id,
        MemoryEntry {
            tick,
            kind,
            x,
            y,
            detail,
        },
    )
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Walk to a target cell within the per-tick move range.
///
/// The agent arrives this tick and is `Walking` until the environment pass
/// returns it to `Idle`. Base cost is the Manhattan distance covered.
fn handle_move(
    agent: &Agent,
    to_x: i32,
    to_y: i32,
    ctx: &HandlerContext,
    config: &ActionConfig,
) -> ActionResult {
    if !ctx.world_size.contains(to_x, to_y) {
        return ActionResult::fail("Target out of bounds");
    }
    let distance = agent.x.abs_diff(to_x) + agent.y.abs_diff(to_y);
    if distance == 0 {
        return ActionResult::fail("Already at target");
    }
    if distance > config.move_range {
        return ActionResult::fail("Target too far");
    }
    let cost = match charge_energy(agent, distance) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = agent.energy - f64::from(cost);
    let patch = AgentPatch {
        x: Some(to_x),
        y: Some(to_y),
        energy: Some(new_energy),
        state: Some(AgentLifeState::Walking),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentMoved,
        agent.id,
        json!({
            "fromX": agent.x,
            "fromY": agent.y,
            "toX": to_x,
            "toY": to_y,
            "energyCost": cost,
            "newEnergy": new_energy,
        }),
    );
    let memory = action_memory(agent, ctx.tick, format!("moved to ({to_x},{to_y})"));

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Gather
// ---------------------------------------------------------------------------

/// Propose a harvest from a spawn at the actor's cell.
///
/// Precondition order: quantity bounds (validation), energy affordability
/// at the requested quantity, a spawn present at the cell, kind match, and
/// units remaining. The engine then performs the atomic harvest and calls
/// [`finalize_gather`] with the granted amount.
fn handle_gather(
    agent: &Agent,
    resource_type: Option<ResourceKind>,
    quantity: u32,
    ctx: &HandlerContext,
) -> ActionResult {
    let multiplier = vitals_multiplier(agent);
    if let Err(reason) = charge_energy(agent, quantity) {
        return ActionResult::fail(reason);
    }
    if ctx.spawns_here.is_empty() {
        return ActionResult::fail(format!(
            "No resources at position ({},{})",
            agent.x, agent.y
        ));
    }
    let spawn = match resource_type {
        Some(kind) => match ctx.spawns_here.iter().find(|s| s.kind == kind) {
            Some(spawn) => spawn,
            None => {
                return ActionResult::fail(format!("No {kind} resource at position"));
            }
        },
        None => match ctx.spawns_here.first() {
            Some(spawn) => spawn,
            None => {
                return ActionResult::fail(format!(
                    "No resources at position ({},{})",
                    agent.x, agent.y
                ));
            }
        },
    };
    if spawn.current_amount == 0 {
        return ActionResult::fail("resource depleted");
    }

    ActionResult::ok(
        ActionChanges {
            harvest: Some(HarvestRequest {
                spawn_id: spawn.id,
                quantity,
                item_type: spawn.kind.display_item(),
                cost_multiplier: multiplier,
            }),
            ..ActionChanges::default()
        },
        Vec::new(),
    )
}

/// The finalized effects of a gather, computed once the store has granted.
#[derive(Debug, Clone, PartialEq)]
pub struct GatherFinalization {
    /// Energy charge for the actor.
    pub patch: AgentPatch,
    /// Inventory credit for the actor.
    pub inventory_delta: (AgentId, ItemType, i64),
    /// The `agent_gathered` event.
    pub event: EventDraft,
    /// The action memory at the actor's cell.
    pub memory: (AgentId, MemoryEntry),
}

/// Finalize a gather after the atomic harvest.
///
/// The actor is charged for what was *granted*, not what was requested;
/// the vitals multiplier captured at validation time still applies. A
/// grant of zero (the spawn emptied between validation and harvest) fails
/// with no effects.
pub fn finalize_gather(
    agent: &Agent,
    request: &HarvestRequest,
    granted: u64,
    tick: u64,
) -> Result<GatherFinalization, String> {
    if granted == 0 {
        return Err(String::from("Failed to gather"));
    }
    // granted <= quantity <= 5, so the cast is lossless.
    let cost = effective_cost(granted as u32, request.cost_multiplier);
    let new_energy = (agent.energy - f64::from(cost)).max(0.0);

    let event = EventDraft::for_agent(
        EventType::AgentGathered,
        agent.id,
        json!({
            "spawnId": request.spawn_id,
            "itemType": request.item_type,
            "amountGathered": granted,
            "energyCost": cost,
            "newEnergy": new_energy,
            "x": agent.x,
            "y": agent.y,
        }),
    );
    // granted fits i64: bounded by the request quantity.
    let inventory_delta = (agent.id, request.item_type, granted as i64);
    let memory = action_memory(
        agent,
        tick,
        format!("gathered {granted} {}", request.item_type),
    );

    Ok(GatherFinalization {
        patch: AgentPatch {
            energy: Some(new_energy),
            ..AgentPatch::default()
        },
        inventory_delta,
        event,
        memory,
    })
}

// ---------------------------------------------------------------------------
// Consume
// ---------------------------------------------------------------------------

/// Consume one item: food restores hunger, batteries restore energy.
fn handle_consume(
    agent: &Agent,
    item_type: ItemType,
    ctx: &HandlerContext,
    config: &ActionConfig,
) -> ActionResult {
    if agent.item_count(item_type) == 0 {
        return ActionResult::fail("Item not in inventory");
    }
    if item_type == ItemType::Material {
        return ActionResult::fail("Item cannot be consumed");
    }
    if let Err(reason) = charge_energy(agent, CONSUME_BASE_COST) {
        return ActionResult::fail(reason);
    }

    let (new_hunger, new_energy) = match item_type {
        ItemType::Food => (
            (agent.hunger + config.food_hunger_restore).min(VITAL_MAX),
            agent.energy,
        ),
        ItemType::Battery => (
            agent.hunger,
            (agent.energy + config.battery_energy_restore).min(VITAL_MAX),
        ),
        ItemType::Material => (agent.hunger, agent.energy),
    };

    let patch = AgentPatch {
        hunger: Some(new_hunger),
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentConsumed,
        agent.id,
        json!({
            "itemType": item_type,
            "newHunger": new_hunger,
            "newEnergy": new_energy,
        }),
    );
    let memory = action_memory(agent, ctx.tick, format!("consumed {item_type}"));

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            inventory_deltas: vec![(agent.id, item_type, -1)],
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Sleep
// ---------------------------------------------------------------------------

/// Fall asleep for `duration` ticks. Recovery happens per tick in the
/// environment pass; waking emits `agent_woke` from there too.
fn handle_sleep(agent: &Agent, duration: u32, _ctx: &HandlerContext) -> ActionResult {
    if agent.state == AgentLifeState::Sleeping {
        return ActionResult::fail("Already sleeping");
    }

    let patch = AgentPatch {
        state: Some(AgentLifeState::Sleeping),
        sleep_ticks_remaining: Some(duration),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentSleeping,
        agent.id,
        json!({"duration": duration}),
    );

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// Work a shift at a shelter: pay in, energy and hunger out.
///
/// Deliberately does NOT set `state = Working`: work is instantaneous per
/// tick, and parking agents in a working state left them permanently stuck
/// once recovery paths were added.
fn handle_work(
    agent: &Agent,
    duration: u32,
    ctx: &HandlerContext,
    config: &ActionConfig,
) -> ActionResult {
    if agent.state == AgentLifeState::Sleeping {
        return ActionResult::fail("Cannot work while sleeping");
    }
    if ctx.shelters_here.is_empty() {
        return ActionResult::fail("Not at a shelter");
    }
    let base = WORK_COST_PER_DURATION * duration;
    let cost = match charge_energy(agent, base) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let earned = config.work_pay * Decimal::from(duration);
    let new_balance = agent.balance + earned;
    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let new_hunger = (agent.hunger - WORK_HUNGER_PER_DURATION * f64::from(duration)).max(0.0);

    let patch = AgentPatch {
        balance: Some(new_balance),
        energy: Some(new_energy),
        hunger: Some(new_hunger),
        ..AgentPatch::default()
    };
    let worked = EventDraft::for_agent(
        EventType::AgentWorked,
        agent.id,
        json!({
            "duration": duration,
            "earned": earned,
            "energyCost": cost,
            "newEnergy": new_energy,
            "newHunger": new_hunger,
        }),
    );
    let balance_changed = EventDraft::for_agent(
        EventType::BalanceChanged,
        agent.id,
        json!({
            "delta": earned,
            "newBalance": new_balance,
            "reason": "work",
        }),
    );
    let memory = action_memory(agent, ctx.tick, format!("worked a {duration}-shift"));

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![worked, balance_changed],
    )
}

// ---------------------------------------------------------------------------
// Buy
// ---------------------------------------------------------------------------

/// Buy items at a shelter.
fn handle_buy(
    agent: &Agent,
    item_type: ItemType,
    quantity: u32,
    ctx: &HandlerContext,
    config: &ActionConfig,
) -> ActionResult {
    if ctx.shelters_here.is_empty() {
        return ActionResult::fail("Not at a shelter");
    }
    if item_type == ItemType::Material {
        return ActionResult::fail("Item not for sale");
    }
    let cost = config.buy_price * Decimal::from(quantity);
    if agent.balance < cost {
        return ActionResult::fail("Not enough balance");
    }

    let new_balance = agent.balance - cost;
    let patch = AgentPatch {
        balance: Some(new_balance),
        ..AgentPatch::default()
    };
    let bought = EventDraft::for_agent(
        EventType::AgentBought,
        agent.id,
        json!({
            "itemType": item_type,
            "quantity": quantity,
            "cost": cost,
            "newBalance": new_balance,
        }),
    );
    let balance_changed = EventDraft::for_agent(
        EventType::BalanceChanged,
        agent.id,
        json!({
            "delta": -cost,
            "newBalance": new_balance,
            "reason": "buy",
        }),
    );
    let memory = action_memory(agent, ctx.tick, format!("bought {quantity} {item_type}"));

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            inventory_deltas: vec![(agent.id, item_type, i64::from(quantity))],
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![bought, balance_changed],
    )
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// Exchange items with an adjacent agent, both legs atomically.
#[allow(clippy::too_many_arguments)]
fn handle_trade(
    agent: &Agent,
    target_id: AgentId,
    offer_item: ItemType,
    offer_quantity: u32,
    request_item: ItemType,
    request_quantity: u32,
    ctx: &HandlerContext,
) -> ActionResult {
    if let Err(reason) = conflict::check_target(agent, ctx.target.as_ref(), CONTACT_RANGE) {
        return ActionResult::fail(reason);
    }
    let Some(target) = ctx.target.as_ref() else {
        return ActionResult::fail("Target not found");
    };
    if agent.item_count(offer_item) < u64::from(offer_quantity) {
        return ActionResult::fail("Not enough items to offer");
    }
    if target.item_count(request_item) < u64::from(request_quantity) {
        return ActionResult::fail("Target lacks requested items");
    }
    let cost = match charge_energy(agent, TRADE_BASE_COST) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentTraded,
        agent.id,
        json!({
            "targetAgentId": target_id,
            "offerItem": offer_item,
            "offerQuantity": offer_quantity,
            "requestItem": request_item,
            "requestQuantity": request_quantity,
            "energyCost": cost,
        }),
    );
    // Counterparties warm to each other a little.
    let goodwill = |owner: AgentId, subject: AgentId| KnowledgeUpdate {
        owner,
        subject,
        sentiment_delta: TRADE_SENTIMENT_GAIN,
        provenance: Some(KnowledgeProvenance {
            discovery_type: DiscoveryType::Direct,
            referred_by: None,
            referral_depth: 0,
        }),
        tick: ctx.tick,
    };
    let memories = vec![
        action_memory(
            agent,
            ctx.tick,
            format!("traded {offer_quantity} {offer_item} for {request_quantity} {request_item}"),
        ),
        memory_for(
            target.id,
            MemoryKind::Social,
            target.x,
            target.y,
            ctx.tick,
            format!("traded with {}", agent.name),
        ),
    ];

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            inventory_deltas: vec![
                (agent.id, offer_item, -i64::from(offer_quantity)),
                (target.id, offer_item, i64::from(offer_quantity)),
                (target.id, request_item, -i64::from(request_quantity)),
                (agent.id, request_item, i64::from(request_quantity)),
            ],
            memories,
            knowledge_updates: vec![goodwill(agent.id, target.id), goodwill(target.id, agent.id)],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Harm
// ---------------------------------------------------------------------------

/// Attack an adjacent agent. Witnesses dock the actor's reputation.
fn handle_harm(
    agent: &Agent,
    target_id: AgentId,
    intensity: HarmIntensity,
    ctx: &HandlerContext,
) -> ActionResult {
    if target_id == agent.id {
        return ActionResult::fail("Cannot target yourself");
    }
    if let Err(reason) = conflict::check_target(agent, ctx.target.as_ref(), CONTACT_RANGE) {
        return ActionResult::fail(reason);
    }
    let Some(target) = ctx.target.as_ref() else {
        return ActionResult::fail("Target not found");
    };
    let cost = match charge_energy(agent, costs::harm_base_cost(intensity)) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let new_target_health = (target.health - intensity.damage()).max(0.0);

    let actor_patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let target_patch = AgentPatch {
        health: Some(new_target_health),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentHarmed,
        agent.id,
        json!({
            "targetAgentId": target_id,
            "intensity": intensity,
            "damage": intensity.damage(),
            "targetHealth": new_target_health,
            "energyCost": cost,
            "witnesses": ctx.witnesses,
        }),
    );

    let mut knowledge_updates = conflict::witness_reputation_updates(
        agent.id,
        &ctx.witnesses,
        intensity.reputation_penalty(),
        ctx.tick,
    );
    // The victim remembers first-hand too.
    knowledge_updates.push(KnowledgeUpdate {
        owner: target.id,
        subject: agent.id,
        sentiment_delta: -intensity.reputation_penalty(),
        provenance: Some(KnowledgeProvenance {
            discovery_type: DiscoveryType::Direct,
            referred_by: None,
            referral_depth: 0,
        }),
        tick: ctx.tick,
    });

    let memories = vec![
        action_memory(agent, ctx.tick, format!("harmed {}", target.name)),
        memory_for(
            target.id,
            MemoryKind::Conflict,
            target.x,
            target.y,
            ctx.tick,
            format!("harmed by {}", agent.name),
        ),
    ];

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, actor_patch), (target.id, target_patch)],
            memories,
            knowledge_updates,
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Steal
// ---------------------------------------------------------------------------

/// Take one item from an adjacent agent.
fn handle_steal(
    agent: &Agent,
    target_id: AgentId,
    item_type: Option<ItemType>,
    ctx: &HandlerContext,
) -> ActionResult {
    if target_id == agent.id {
        return ActionResult::fail("Cannot target yourself");
    }
    if let Err(reason) = conflict::check_target(agent, ctx.target.as_ref(), CONTACT_RANGE) {
        return ActionResult::fail(reason);
    }
    let Some(target) = ctx.target.as_ref() else {
        return ActionResult::fail("Target not found");
    };
    let stolen_item = match item_type {
        Some(item) => {
            if target.item_count(item) == 0 {
                return ActionResult::fail("Target has no such item");
            }
            item
        }
        None => match target.inventory.keys().next() {
            Some(item) => *item,
            None => return ActionResult::fail("Nothing to steal"),
        },
    };
    let cost = match charge_energy(agent, STEAL_BASE_COST) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentStole,
        agent.id,
        json!({
            "targetAgentId": target_id,
            "itemType": stolen_item,
            "energyCost": cost,
            "witnesses": ctx.witnesses,
        }),
    );

    let mut knowledge_updates = conflict::witness_reputation_updates(
        agent.id,
        &ctx.witnesses,
        STEAL_REPUTATION_PENALTY,
        ctx.tick,
    );
    knowledge_updates.push(KnowledgeUpdate {
        owner: target.id,
        subject: agent.id,
        sentiment_delta: -STEAL_REPUTATION_PENALTY,
        provenance: Some(KnowledgeProvenance {
            discovery_type: DiscoveryType::Direct,
            referred_by: None,
            referral_depth: 0,
        }),
        tick: ctx.tick,
    });

    let memories = vec![
        action_memory(agent, ctx.tick, format!("stole {stolen_item} from {}", target.name)),
        memory_for(
            target.id,
            MemoryKind::Conflict,
            target.x,
            target.y,
            ctx.tick,
            format!("robbed by {}", agent.name),
        ),
    ];

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            inventory_deltas: vec![
                (target.id, stolen_item, -1),
                (agent.id, stolen_item, 1),
            ],
            memories,
            knowledge_updates,
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Deceive
// ---------------------------------------------------------------------------

/// Plant a false claim in a nearby agent's memory. Carries to Manhattan
/// distance 3; witnesses who see through it dock the actor.
fn handle_deceive(
    agent: &Agent,
    target_id: AgentId,
    claim: &str,
    claim_type: ClaimType,
    ctx: &HandlerContext,
) -> ActionResult {
    if target_id == agent.id {
        return ActionResult::fail("Cannot target yourself");
    }
    if let Err(reason) = conflict::check_target(agent, ctx.target.as_ref(), DECEIVE_RANGE) {
        return ActionResult::fail(reason);
    }
    let Some(target) = ctx.target.as_ref() else {
        return ActionResult::fail("Target not found");
    };
    let cost = match charge_energy(agent, DECEIVE_BASE_COST) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentDeceived,
        agent.id,
        json!({
            "targetAgentId": target_id,
            "claimType": claim_type,
            "claim": claim,
            "energyCost": cost,
            "witnesses": ctx.witnesses,
        }),
    );

    let knowledge_updates = conflict::witness_reputation_updates(
        agent.id,
        &ctx.witnesses,
        DECEIVE_REPUTATION_PENALTY,
        ctx.tick,
    );
    // The listener stores the claim as if it were genuine.
    let memories = vec![
        action_memory(agent, ctx.tick, String::from("spread a false claim")),
        memory_for(
            target.id,
            MemoryKind::Social,
            target.x,
            target.y,
            ctx.tick,
            format!("{} said: {claim}", agent.name),
        ),
    ];

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            memories,
            knowledge_updates,
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Share info
// ---------------------------------------------------------------------------

/// Tell a nearby agent about a third agent. The listener's record of the
/// subject is tagged as a referral one hop deeper than the sharer's own
/// knowledge.
fn handle_share_info(
    agent: &Agent,
    target_id: AgentId,
    subject_id: AgentId,
    info_type: InfoType,
    sentiment: Option<i32>,
    ctx: &HandlerContext,
) -> ActionResult {
    if target_id == agent.id || subject_id == agent.id {
        return ActionResult::fail("Sharer, subject, and target must be distinct");
    }
    if let Err(reason) = conflict::check_target(agent, ctx.target.as_ref(), DECEIVE_RANGE) {
        return ActionResult::fail(reason);
    }
    let Some(target) = ctx.target.as_ref() else {
        return ActionResult::fail("Target not found");
    };
    if ctx.subject.is_none() {
        return ActionResult::fail("Subject not found");
    }
    let cost = match charge_energy(agent, SHARE_INFO_BASE_COST) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    // The listener's record is one hop deeper than the sharer's own.
    let sharer_depth = agent
        .knowledge
        .get(&subject_id)
        .map_or(0, |record| record.referral_depth);
    let listener_depth = sharer_depth.saturating_add(1);

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentSharedInfo,
        agent.id,
        json!({
            "targetAgentId": target_id,
            "subjectAgentId": subject_id,
            "infoType": info_type,
            "sentiment": sentiment,
            "referralDepth": listener_depth,
            "energyCost": cost,
        }),
    );
    let knowledge_updates = vec![KnowledgeUpdate {
        owner: target.id,
        subject: subject_id,
        sentiment_delta: sentiment.unwrap_or(0),
        provenance: Some(KnowledgeProvenance {
            discovery_type: DiscoveryType::Referral,
            referred_by: Some(agent.id),
            referral_depth: listener_depth,
        }),
        tick: ctx.tick,
    }];
    let memories = vec![memory_for(
        target.id,
        MemoryKind::Social,
        target.x,
        target.y,
        ctx.tick,
        format!("{} shared information about another agent", agent.name),
    )];

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            memories,
            knowledge_updates,
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// Claim ownership of an unowned shelter at the actor's cell.
fn handle_claim(agent: &Agent, ctx: &HandlerContext) -> ActionResult {
    let Some(shelter) = ctx.shelters_here.first() else {
        return ActionResult::fail("No shelter to claim");
    };
    if let Some(owner) = shelter.owner_agent {
        if owner == agent.id {
            return ActionResult::fail("Already yours");
        }
        return ActionResult::fail("Shelter already owned");
    }
    let cost = match charge_energy(agent, CLAIM_BASE_COST) {
        Ok(cost) => cost,
        Err(reason) => return ActionResult::fail(reason),
    };

    let new_energy = (agent.energy - f64::from(cost)).max(0.0);
    let patch = AgentPatch {
        energy: Some(new_energy),
        ..AgentPatch::default()
    };
    let event = EventDraft::for_agent(
        EventType::AgentClaimed,
        agent.id,
        json!({
            "shelterId": shelter.id,
            "x": shelter.x,
            "y": shelter.y,
            "energyCost": cost,
        }),
    );
    let memory = action_memory(agent, ctx.tick, String::from("claimed a shelter"));

    ActionResult::ok(
        ActionChanges {
            agent_patches: vec![(agent.id, patch)],
            shelter_owner: Some((shelter.id, agent.id)),
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

// ---------------------------------------------------------------------------
// Name location
// ---------------------------------------------------------------------------

/// Name the actor's current cell.
fn handle_name_location(agent: &Agent, name: &str, ctx: &HandlerContext) -> ActionResult {
    if let Err(reason) = charge_energy(agent, NAME_LOCATION_BASE_COST) {
        return ActionResult::fail(reason);
    }
    let trimmed = name.trim().to_owned();
    let event = EventDraft::for_agent(
        EventType::LocationNamed,
        agent.id,
        json!({
            "x": agent.x,
            "y": agent.y,
            "name": trimmed,
        }),
    );
    let memory = action_memory(agent, ctx.tick, format!("named this place {trimmed}"));

    ActionResult::ok(
        ActionChanges {
            named_location: Some((agent.x, agent.y, trimmed)),
            memories: vec![memory],
            ..ActionChanges::default()
        },
        vec![event],
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use habitat_types::{
        AgentDecision, Biome, IntentSource, ResourceSpawn, Shelter, ShelterId, SpawnId, WorldSize,
    };

    use super::*;

    fn make_agent(x: i32, y: i32) -> Agent {
        Agent {
            id: AgentId::new(),
            name: String::from("Actor"),
            policy_type: String::from("fallback"),
            x,
            y,
            hunger: 80.0,
            energy: 80.0,
            health: 100.0,
            balance: Decimal::ZERO,
            state: AgentLifeState::Idle,
            color: String::from("#000"),
            personality: None,
            spawn_index: 0,
            sleep_ticks_remaining: 0,
            died_at: None,
            death_cause: None,
            inventory: BTreeMap::new(),
            knowledge: BTreeMap::new(),
            memories: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn make_intent(agent: &Agent, params: ActionParams) -> ActionIntent {
        ActionIntent {
            agent_id: agent.id,
            tick: 1,
            decision: AgentDecision::new(params),
            source: IntentSource::Policy,
            submitted_at: Utc::now(),
        }
    }

    fn food_spawn(x: i32, y: i32, amount: u64) -> ResourceSpawn {
        ResourceSpawn {
            id: SpawnId::new(),
            x,
            y,
            kind: ResourceKind::Food,
            current_amount: amount,
            max_amount: 20,
            regen_rate: 1,
            biome: Biome::Plains,
        }
    }

    fn shelter_at(x: i32, y: i32) -> Shelter {
        Shelter {
            id: ShelterId::new(),
            x,
            y,
            can_sleep: true,
            owner_agent: None,
        }
    }

    fn base_ctx() -> HandlerContext {
        HandlerContext {
            tick: 1,
            world_size: WorldSize::default(),
            ..HandlerContext::default()
        }
    }

    // -- gather ------------------------------------------------------------

    #[test]
    fn gather_proposes_harvest() {
        let mut agent = make_agent(50, 50);
        agent.energy = 80.0;
        let spawn = food_spawn(50, 50, 10);
        let spawn_id = spawn.id;
        let ctx = HandlerContext {
            spawns_here: vec![spawn],
            ..base_ctx()
        };
        let intent = make_intent(
            &agent,
            ActionParams::Gather {
                resource_type: None,
                quantity: 2,
            },
        );
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let harvest = result.changes.harvest.unwrap();
        assert_eq!(harvest.spawn_id, spawn_id);
        assert_eq!(harvest.quantity, 2);
        assert_eq!(harvest.item_type, ItemType::Food);
        assert!(result.events.is_empty(), "event waits for the grant");
    }

    #[test]
    fn finalize_gather_matches_worked_example() {
        // Agent at (50,50), energy 80, gathers 2 from a food spawn:
        // event carries amountGathered 2, energyCost 2, newEnergy 78.
        let agent = make_agent(50, 50);
        let request = HarvestRequest {
            spawn_id: SpawnId::new(),
            quantity: 2,
            item_type: ItemType::Food,
            cost_multiplier: 1.0,
        };
        let finalized = finalize_gather(&agent, &request, 2, 1).unwrap();
        assert_eq!(finalized.patch.energy, Some(78.0));
        assert_eq!(finalized.inventory_delta.2, 2);
        let payload = &finalized.event.payload;
        assert_eq!(payload["amountGathered"], 2);
        assert_eq!(payload["energyCost"], 2);
        assert_eq!(payload["newEnergy"], 78.0);
    }

    #[test]
    fn finalize_gather_zero_grant_fails() {
        let agent = make_agent(0, 0);
        let request = HarvestRequest {
            spawn_id: SpawnId::new(),
            quantity: 2,
            item_type: ItemType::Food,
            cost_multiplier: 1.0,
        };
        let err = finalize_gather(&agent, &request, 0, 1).unwrap_err();
        assert_eq!(err, "Failed to gather");
    }

    #[test]
    fn gather_at_depleted_spawn_rejected() {
        let agent = make_agent(50, 50);
        let ctx = HandlerContext {
            spawns_here: vec![food_spawn(50, 50, 0)],
            ..base_ctx()
        };
        let intent = make_intent(
            &agent,
            ActionParams::Gather {
                resource_type: None,
                quantity: 2,
            },
        );
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("depleted"));
        assert!(result.events.is_empty());
    }

    #[test]
    fn gather_with_no_spawn_names_position() {
        let agent = make_agent(7, 9);
        let intent = make_intent(
            &agent,
            ActionParams::Gather {
                resource_type: None,
                quantity: 1,
            },
        );
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(
            result.error.as_deref(),
            Some("No resources at position (7,9)")
        );
    }

    #[test]
    fn gather_wrong_kind_rejected() {
        let agent = make_agent(5, 5);
        let ctx = HandlerContext {
            spawns_here: vec![food_spawn(5, 5, 10)],
            ..base_ctx()
        };
        let intent = make_intent(
            &agent,
            ActionParams::Gather {
                resource_type: Some(ResourceKind::Energy),
                quantity: 1,
            },
        );
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(
            result.error.as_deref(),
            Some("No energy resource at position")
        );
    }

    // -- work --------------------------------------------------------------

    #[test]
    fn work_with_penalty_matches_worked_example() {
        // energy 10, hunger 20: multiplier 2.3, base cost 4 -> effective 10.
        // Accepted exactly at energy 10; balance +20; energy 0.
        let mut agent = make_agent(3, 3);
        agent.energy = 10.0;
        agent.hunger = 20.0;
        let ctx = HandlerContext {
            shelters_here: vec![shelter_at(3, 3)],
            ..base_ctx()
        };
        let intent = make_intent(&agent, ActionParams::Work { duration: 2 });
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success, "energy exactly sufficient must pass");

        let (_, patch) = &result.changes.agent_patches[0];
        assert_eq!(patch.energy, Some(0.0));
        assert_eq!(patch.balance, Some(Decimal::from(20)));
        assert_eq!(patch.hunger, Some(19.0));
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].event_type, EventType::AgentWorked);
        assert_eq!(result.events[1].event_type, EventType::BalanceChanged);
    }

    #[test]
    fn work_away_from_shelter_rejected() {
        let agent = make_agent(3, 3);
        let intent = make_intent(&agent, ActionParams::Work { duration: 2 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Not at a shelter"));
    }

    #[test]
    fn work_never_sets_working_state() {
        let agent = make_agent(3, 3);
        let ctx = HandlerContext {
            shelters_here: vec![shelter_at(3, 3)],
            ..base_ctx()
        };
        let intent = make_intent(&agent, ActionParams::Work { duration: 1 });
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let (_, patch) = &result.changes.agent_patches[0];
        assert!(patch.state.is_none());
    }

    // -- harm --------------------------------------------------------------

    #[test]
    fn harm_at_distance_two_rejected_at_one_accepted() {
        let agent = make_agent(5, 5);
        let far = make_agent(5, 7);
        let near = make_agent(5, 6);

        let intent = make_intent(
            &agent,
            ActionParams::Harm {
                target_agent_id: far.id,
                intensity: HarmIntensity::Moderate,
            },
        );
        let ctx = HandlerContext {
            target: Some(far),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Target too far away"));

        let intent = make_intent(
            &agent,
            ActionParams::Harm {
                target_agent_id: near.id,
                intensity: HarmIntensity::Moderate,
            },
        );
        let ctx = HandlerContext {
            target: Some(near.clone()),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let target_patch = result
            .changes
            .agent_patches
            .iter()
            .find(|(id, _)| *id == near.id)
            .unwrap();
        assert_eq!(target_patch.1.health, Some(85.0));
    }

    #[test]
    fn harm_self_target_rejected() {
        let agent = make_agent(5, 5);
        let intent = make_intent(
            &agent,
            ActionParams::Harm {
                target_agent_id: agent.id,
                intensity: HarmIntensity::Light,
            },
        );
        let ctx = HandlerContext {
            target: Some(agent.clone()),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Cannot target yourself"));
    }

    #[test]
    fn harm_witnesses_dock_reputation() {
        let agent = make_agent(5, 5);
        let target = make_agent(5, 6);
        let witness = AgentId::new();
        let intent = make_intent(
            &agent,
            ActionParams::Harm {
                target_agent_id: target.id,
                intensity: HarmIntensity::Severe,
            },
        );
        let ctx = HandlerContext {
            target: Some(target.clone()),
            witnesses: vec![witness],
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let witness_update = result
            .changes
            .knowledge_updates
            .iter()
            .find(|u| u.owner == witness)
            .unwrap();
        assert_eq!(witness_update.subject, agent.id);
        assert_eq!(witness_update.sentiment_delta, -50);
    }

    // -- social ------------------------------------------------------------

    #[test]
    fn share_info_increments_referral_depth() {
        let mut agent = make_agent(5, 5);
        let target = make_agent(5, 6);
        let subject = make_agent(40, 40);
        // The sharer knows the subject through one referral already.
        agent.knowledge.insert(
            subject.id,
            habitat_types::KnowledgeRecord {
                sentiment: 10,
                discovery_type: DiscoveryType::Referral,
                referred_by: Some(AgentId::new()),
                referral_depth: 1,
                tick: 0,
            },
        );
        let intent = make_intent(
            &agent,
            ActionParams::ShareInfo {
                target_agent_id: target.id,
                subject_agent_id: subject.id,
                info_type: InfoType::Reputation,
                sentiment: Some(20),
            },
        );
        let ctx = HandlerContext {
            target: Some(target.clone()),
            subject: Some(subject.clone()),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let update = &result.changes.knowledge_updates[0];
        assert_eq!(update.owner, target.id);
        assert_eq!(update.subject, subject.id);
        let provenance = update.provenance.as_ref().unwrap();
        assert_eq!(provenance.referral_depth, 2);
        assert_eq!(provenance.referred_by, Some(agent.id));
        assert_eq!(provenance.discovery_type, DiscoveryType::Referral);
    }

    #[test]
    fn share_info_rejects_non_distinct_roles() {
        let agent = make_agent(5, 5);
        let target = make_agent(5, 6);
        let intent = make_intent(
            &agent,
            ActionParams::ShareInfo {
                target_agent_id: target.id,
                subject_agent_id: agent.id,
                info_type: InfoType::Location,
                sentiment: None,
            },
        );
        let ctx = HandlerContext {
            target: Some(target),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(
            result.error.as_deref(),
            Some("Sharer, subject, and target must be distinct")
        );
    }

    // -- move / sleep / consume / buy / trade / claim ----------------------

    #[test]
    fn move_sets_walking_and_charges_distance() {
        let agent = make_agent(5, 5);
        let intent = make_intent(&agent, ActionParams::Move { to_x: 7, to_y: 6 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert!(result.success);
        let (_, patch) = &result.changes.agent_patches[0];
        assert_eq!(patch.x, Some(7));
        assert_eq!(patch.y, Some(6));
        assert_eq!(patch.state, Some(AgentLifeState::Walking));
        assert_eq!(patch.energy, Some(77.0));
    }

    #[test]
    fn move_out_of_bounds_rejected() {
        let agent = make_agent(0, 0);
        let intent = make_intent(&agent, ActionParams::Move { to_x: -1, to_y: 0 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Target out of bounds"));
    }

    #[test]
    fn move_beyond_range_rejected() {
        let agent = make_agent(0, 0);
        let intent = make_intent(&agent, ActionParams::Move { to_x: 6, to_y: 0 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Target too far"));
    }

    #[test]
    fn sleep_sets_state_and_countdown() {
        let agent = make_agent(1, 1);
        let intent = make_intent(&agent, ActionParams::Sleep { duration: 3 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert!(result.success);
        let (_, patch) = &result.changes.agent_patches[0];
        assert_eq!(patch.state, Some(AgentLifeState::Sleeping));
        assert_eq!(patch.sleep_ticks_remaining, Some(3));
        assert_eq!(result.events[0].event_type, EventType::AgentSleeping);
    }

    #[test]
    fn consume_food_restores_hunger() {
        let mut agent = make_agent(1, 1);
        agent.hunger = 40.0;
        agent.inventory.insert(ItemType::Food, 2);
        let intent = make_intent(
            &agent,
            ActionParams::Consume {
                item_type: ItemType::Food,
            },
        );
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert!(result.success);
        let (_, patch) = &result.changes.agent_patches[0];
        assert_eq!(patch.hunger, Some(70.0));
        assert_eq!(result.changes.inventory_deltas, vec![(agent.id, ItemType::Food, -1)]);
    }

    #[test]
    fn consume_missing_item_rejected() {
        let agent = make_agent(1, 1);
        let intent = make_intent(
            &agent,
            ActionParams::Consume {
                item_type: ItemType::Food,
            },
        );
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Item not in inventory"));
    }

    #[test]
    fn buy_requires_shelter_and_balance() {
        let mut agent = make_agent(2, 2);
        agent.balance = Decimal::from(15);
        let intent = make_intent(
            &agent,
            ActionParams::Buy {
                item_type: ItemType::Food,
                quantity: 1,
            },
        );
        // No shelter.
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Not at a shelter"));

        // At a shelter but short on funds for 2.
        let ctx = HandlerContext {
            shelters_here: vec![shelter_at(2, 2)],
            ..base_ctx()
        };
        let broke_intent = make_intent(
            &agent,
            ActionParams::Buy {
                item_type: ItemType::Food,
                quantity: 2,
            },
        );
        let result = handle_intent(&broke_intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Not enough balance"));

        // Affordable.
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        let (_, patch) = &result.changes.agent_patches[0];
        assert_eq!(patch.balance, Some(Decimal::from(5)));
    }

    #[test]
    fn trade_moves_both_legs() {
        let mut agent = make_agent(4, 4);
        agent.inventory.insert(ItemType::Food, 3);
        let mut target = make_agent(4, 5);
        target.inventory.insert(ItemType::Material, 2);
        let intent = make_intent(
            &agent,
            ActionParams::Trade {
                target_agent_id: target.id,
                offer_item: ItemType::Food,
                offer_quantity: 2,
                request_item: ItemType::Material,
                request_quantity: 1,
            },
        );
        let ctx = HandlerContext {
            target: Some(target.clone()),
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        assert_eq!(result.changes.inventory_deltas.len(), 4);
        assert!(result
            .changes
            .inventory_deltas
            .contains(&(target.id, ItemType::Food, 2)));
        assert!(result
            .changes
            .inventory_deltas
            .contains(&(agent.id, ItemType::Material, 1)));
    }

    #[test]
    fn claim_unowned_shelter_succeeds_owned_fails() {
        let agent = make_agent(6, 6);
        let mut shelter = shelter_at(6, 6);
        let ctx = HandlerContext {
            shelters_here: vec![shelter.clone()],
            ..base_ctx()
        };
        let intent = make_intent(&agent, ActionParams::Claim {});
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert!(result.success);
        assert_eq!(result.changes.shelter_owner, Some((shelter.id, agent.id)));

        shelter.owner_agent = Some(AgentId::new());
        let ctx = HandlerContext {
            shelters_here: vec![shelter],
            ..base_ctx()
        };
        let result = handle_intent(&intent, &agent, &ctx, &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Shelter already owned"));
    }

    #[test]
    fn dead_agent_rejected() {
        let mut agent = make_agent(0, 0);
        agent.state = AgentLifeState::Dead;
        let intent = make_intent(&agent, ActionParams::Sleep { duration: 1 });
        let result = handle_intent(&intent, &agent, &base_ctx(), &ActionConfig::default());
        assert_eq!(result.error.as_deref(), Some("Agent is dead"));
    }
}
