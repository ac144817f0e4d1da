//! Boot command script parser.
//!
//! Turns interpolated command text into an [`ExpressionSequence`] of
//! primitive actions that can be replayed without re-parsing. Parsing is
//! deterministic: identical input always yields an identical sequence.

use super::keys::SpecialKey;
use crate::error::{ForgeError, ForgeResult};
use std::time::Duration;

/// How a special key tag drives the key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Press and release.
    Press,
    /// Key down, held until a matching `Off`.
    On,
    /// Key up.
    Off,
}

/// A single replayable action.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Type one character, shifting if the US layout requires it.
    Literal(char),
    /// Drive a named special key.
    Special { key: SpecialKey, action: KeyAction },
    /// Pause replay for the given duration.
    Wait(Duration),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionSequence(pub(crate) Vec<Expression>);

impl ExpressionSequence {
    pub fn expressions(&self) -> &[Expression] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Parse boot command text into an expression sequence.
///
/// `<tag>` forms are recognized for special keys (with optional `On`/`Off`
/// suffixes), and `<wait>`, `<wait5>`, `<wait10>` or `<waitDURATION>` for
/// delays. An unknown tag or a malformed wait duration is a hard parse
/// error; a `<` without a closing `>` is typed literally.
pub fn parse(input: &str) -> ForgeResult<ExpressionSequence> {
    let mut exprs = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let Some(open) = rest.find('<') else {
            exprs.extend(rest.chars().map(Expression::Literal));
            break;
        };

        let (literals, tagged) = rest.split_at(open);
        exprs.extend(literals.chars().map(Expression::Literal));

        let Some(close) = tagged.find('>') else {
            exprs.extend(tagged.chars().map(Expression::Literal));
            break;
        };

        let tag = &tagged[1..close];
        exprs.push(parse_tag(tag)?);
        rest = &tagged[close + 1..];
    }

    Ok(ExpressionSequence(exprs))
}

fn parse_tag(tag: &str) -> ForgeResult<Expression> {
    let lower = tag.to_ascii_lowercase();

    if let Some(wait) = lower.strip_prefix("wait") {
        let duration = match wait {
            "" => Duration::from_secs(1),
            "5" => Duration::from_secs(5),
            "10" => Duration::from_secs(10),
            spec => parse_duration(spec).map_err(|e| {
                ForgeError::BootCommand(format!("invalid wait duration in <{tag}>: {e}"))
            })?,
        };
        return Ok(Expression::Wait(duration));
    }

    if let Some(base) = lower.strip_suffix("on") {
        if let Some(key) = SpecialKey::from_tag(base) {
            return Ok(Expression::Special {
                key,
                action: KeyAction::On,
            });
        }
    }
    if let Some(base) = lower.strip_suffix("off") {
        if let Some(key) = SpecialKey::from_tag(base) {
            return Ok(Expression::Special {
                key,
                action: KeyAction::Off,
            });
        }
    }
    if let Some(key) = SpecialKey::from_tag(&lower) {
        return Ok(Expression::Special {
            key,
            action: KeyAction::Press,
        });
    }

    Err(ForgeError::BootCommand(format!(
        "unknown boot command tag <{tag}>"
    )))
}

/// Parse a Go-style duration such as `5s`, `500ms` or `1m30s`.
fn parse_duration(spec: &str) -> Result<Duration, String> {
    if spec.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = spec;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in '{spec}'"))?;
        if num_end == 0 {
            return Err(format!("malformed duration '{spec}'"));
        }

        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("malformed number in '{spec}'"))?;
        rest = &rest[num_end..];

        let units: &[(&str, f64)] = &[
            ("ns", 1e-9),
            ("us", 1e-6),
            ("µs", 1e-6),
            ("ms", 1e-3),
            ("s", 1.0),
            ("m", 60.0),
            ("h", 3600.0),
        ];
        let (suffix, scale) = units
            .iter()
            .find(|(suffix, _)| rest.starts_with(suffix))
            .ok_or_else(|| format!("unknown unit in '{spec}'"))?;

        let component = Duration::try_from_secs_f64(value * scale)
            .map_err(|_| format!("duration '{spec}' is out of range"))?;
        total = total
            .checked_add(component)
            .ok_or_else(|| format!("duration '{spec}' is out of range"))?;
        rest = &rest[suffix.len()..];
    }

    Ok(total)
}
