//! LLM response parsing into validated decisions.
//!
//! Policies are instructed to emit a single JSON object, but real models
//! wrap it in prose, code fences, or leave trailing commas. Recovery
//! strategies are tried in order; whatever parses is then run through the
//! same parameter validation the action pipeline applies, so a decision
//! that parses here is exactly as acceptable as one from the cache.

use habitat_agents::validation::validate_params;
use habitat_types::AgentDecision;

use crate::error::AdapterError;

/// Parse a raw response into a validated [`AgentDecision`].
///
/// Strategies, in order:
/// 1. direct `serde_json` parse
/// 2. extract from a markdown code fence
/// 3. strip trailing commas and retry
/// 4. extract the first `{...}` object and retry both
///
/// # Errors
///
/// Returns [`AdapterError::Parse`] when nothing parses and
/// [`AdapterError::Validation`] when the parsed decision fails the
/// pipeline's parameter validation.
pub fn parse_decision(raw: &str) -> Result<AgentDecision, AdapterError> {
    let decision = try_parse(raw)?;
    validate_params(&decision.params).map_err(AdapterError::Validation)?;
    Ok(decision)
}

/// Run the recovery strategies without validation.
fn try_parse(raw: &str) -> Result<AgentDecision, AdapterError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse.
    if let Ok(decision) = parse_candidate(trimmed) {
        return Ok(decision);
    }

    // Strategy 2: markdown code fence.
    if let Some(inner) = extract_json_from_codeblock(trimmed)
        && let Ok(decision) = parse_candidate(inner)
    {
        return Ok(decision);
    }

    // Strategy 3: strip trailing commas.
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(decision) = parse_candidate(&cleaned) {
        return Ok(decision);
    }

    // Strategy 4: first {...} object, raw then comma-stripped.
    if let Some(object) = extract_first_object(trimmed) {
        if let Ok(decision) = parse_candidate(object) {
            return Ok(decision);
        }
        let cleaned = strip_trailing_commas(object);
        if let Ok(decision) = parse_candidate(&cleaned) {
            return Ok(decision);
        }
    }

    Err(AdapterError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Parse one candidate string, tolerating a missing `params` object.
fn parse_candidate(candidate: &str) -> Result<AgentDecision, serde_json::Error> {
    match serde_json::from_str::<AgentDecision>(candidate) {
        Ok(decision) => Ok(decision),
        Err(err) => {
            // Some models omit "params" entirely for parameterless
            // actions; inject an empty object and retry once.
            let Ok(mut value) = serde_json::from_str::<serde_json::Value>(candidate) else {
                return Err(err);
            };
            if let Some(map) = value.as_object_mut()
                && !map.contains_key("params")
            {
                map.insert(
                    String::from("params"),
                    serde_json::Value::Object(serde_json::Map::new()),
                );
                return serde_json::from_value(value);
            }
            Err(err)
        }
    }
}

/// Pull the contents of the first fenced code block, if any.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip a language tag like `json` on the fence line.
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Remove trailing commas before closing brackets.
fn strip_trailing_commas(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            // Look ahead past whitespace for a closing bracket.
            let mut lookahead = chars.clone();
            let mut next_significant = None;
            for n in lookahead.by_ref() {
                if !n.is_whitespace() {
                    next_significant = Some(n);
                    break;
                }
            }
            if matches!(next_significant, Some('}' | ']')) {
                continue;
            }
        }
        cleaned.push(c);
    }
    cleaned
}

/// Slice out the first balanced `{...}` object, if any.
fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
