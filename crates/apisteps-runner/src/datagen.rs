//! Schema → example value (generation) or [`Matcher`] (validation)
//!
//! Both modes share one traversal ([`Walker`]); a [`Mode`] decides what each
//! node turns into. References resolve through the [`Document`] and are
//! tracked along the current descent, so a self-referential schema ends in an
//! omitted member (or `@ignore@`) instead of recursing forever.
//!
//! Nullable schemas generate non-null values; their matchers also accept `null`.

use apisteps_core::dictionary::child_path;
use apisteps_core::{Document, ObjectSchema, Primitive, PrimitiveType, Schema, SchemaError};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config as RunnerConfig, RngAlgorithm, TestRng, TestRunner};
use rand::Rng;
use serde_json::{Map, Value, json};

use crate::matcher::{Bounds, Matcher};

/// Maximum nesting depth for schema traversal.
const MAX_DEPTH: u32 = 20;

/// Maximum string length for generation (prevents OOM on absurd maxLength values).
const MAX_STRING_LEN: usize = 10_000;

const DEFAULT_MAX_STRING_LEN: usize = 20;

/// Integers default to `1..=1000`; a single declared bound spans this far.
const DEFAULT_INT_MIN: i64 = 1;
const DEFAULT_INT_SPAN: i64 = 999;

const DEFAULT_NUMBER_SPAN: f64 = 1000.0;

/// Generate an example value for `schema`.
///
/// Objects get every required property (all properties when none are
/// required); arrays get exactly one item. `location` names the value in
/// error messages, e.g. `body` or `query limit`.
///
/// # Errors
///
/// Returns [`SchemaError`] for unresolved references, cycles through required
/// members, nesting deeper than 20 levels, untyped schemas and bounds no value
/// can satisfy.
pub fn generate(
    schema: &Schema,
    document: &Document,
    rng: &mut impl Rng,
    location: &str,
) -> Result<Value, SchemaError> {
    Walker::new(document, Generate { rng }).run(schema, location)
}

/// Build a matcher accepting every value `schema` allows.
///
/// Objects expect all declared properties.
///
/// # Errors
///
/// See [`generate`].
pub fn expect(schema: &Schema, document: &Document, location: &str) -> Result<Matcher, SchemaError> {
    Walker::new(document, Expect).run(schema, location)
}

/// Whether a missing result is acceptable at this position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Required,
    Optional,
}

/// What each schema node becomes.
trait Mode {
    type Out;

    fn primitive(&mut self, primitive: &Primitive, location: &str) -> Result<Self::Out, SchemaError>;
    /// Include non-required properties of objects that do have required ones.
    fn all_properties(&self) -> bool;
    fn object(&mut self, members: Vec<(String, Self::Out)>) -> Self::Out;
    fn array(&mut self, item: Option<Self::Out>) -> Self::Out;
    /// Result for a cyclic reference in an optional slot.
    fn on_cycle(&mut self) -> Option<Self::Out>;
    /// Indices of the `oneOf` variants to walk.
    fn choose_variants(&mut self, count: usize) -> Vec<usize>;
    fn one_of(&mut self, outs: Vec<Self::Out>) -> Option<Self::Out>;
    fn all_of(&mut self, outs: Vec<Self::Out>) -> Self::Out;
    fn nullable(&mut self, inner: Self::Out) -> Self::Out;
}

struct Walker<'d, M> {
    document: &'d Document,
    mode: M,
    /// References entered along the current descent
    trail: Vec<String>,
    /// Set while a cycle through required members unwinds
    required_cycle: bool,
}

impl<'d, M: Mode> Walker<'d, M> {
    const fn new(document: &'d Document, mode: M) -> Self {
        Self {
            document,
            mode,
            trail: Vec::new(),
            required_cycle: false,
        }
    }

    fn run(mut self, schema: &Schema, location: &str) -> Result<M::Out, SchemaError> {
        self.walk(schema, Slot::Required, location, 0)?
            .ok_or_else(|| SchemaError::unsupported(location, "schema yields no value"))
    }

    fn walk(
        &mut self,
        schema: &Schema,
        slot: Slot,
        location: &str,
        depth: u32,
    ) -> Result<Option<M::Out>, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::unsupported(
                location,
                format!("nesting deeper than {MAX_DEPTH} levels"),
            ));
        }

        match schema {
            Schema::Reference(reference) => self.reference(reference, slot, location, depth),
            Schema::Primitive(primitive) => self.mode.primitive(primitive, location).map(Some),
            Schema::Object(object) => self.object(object, location, depth).map(Some),
            Schema::Array(item) => {
                let item = self.walk_optional(item, &format!("{location}[]"), depth + 1)?;
                Ok(Some(self.mode.array(item)))
            }
            Schema::OneOf(variants) => {
                if variants.is_empty() {
                    return Err(SchemaError::unsupported(location, "oneOf/anyOf without non-null variants"));
                }
                let mut outs = Vec::new();
                for index in self.mode.choose_variants(variants.len()) {
                    if let Some(out) = self.walk(&variants[index], slot, location, depth + 1)? {
                        outs.push(out);
                    }
                }
                Ok(self.mode.one_of(outs))
            }
            Schema::AllOf(parts) => {
                let mut outs = Vec::new();
                // description-only parts carry no shape
                for part in parts.iter().filter(|p| !p.is_opaque()) {
                    if let Some(out) = self.walk(part, slot, location, depth + 1)? {
                        outs.push(out);
                    }
                }
                if outs.is_empty() {
                    return Err(SchemaError::unsupported(location, "allOf without typed parts"));
                }
                Ok(Some(self.mode.all_of(outs)))
            }
            Schema::Nullable(inner) => {
                let out = self.walk(inner, slot, location, depth)?;
                Ok(out.map(|out| self.mode.nullable(out)))
            }
            Schema::Opaque => Err(SchemaError::unsupported(
                location,
                "schema declares no type, format, enum or properties",
            )),
        }
    }

    fn reference(
        &mut self,
        reference: &str,
        slot: Slot,
        location: &str,
        depth: u32,
    ) -> Result<Option<M::Out>, SchemaError> {
        if self.trail.iter().any(|r| r == reference) {
            return match slot {
                Slot::Optional => {
                    tracing::warn!(reference, location, "cyclic reference in optional member, not expanded");
                    Ok(self.mode.on_cycle())
                }
                Slot::Required => {
                    self.required_cycle = true;
                    Err(SchemaError::unsupported(
                        location,
                        format!("cyclic reference {reference} through required members"),
                    ))
                }
            };
        }
        let document = self.document;
        let target = document.resolve_schema(reference)?;
        self.trail.push(reference.to_string());
        let out = self.walk(target, slot, location, depth + 1);
        self.trail.pop();
        out
    }

    fn object(&mut self, object: &ObjectSchema, location: &str, depth: u32) -> Result<M::Out, SchemaError> {
        let populate_all = self.mode.all_properties() || object.required.is_empty();
        let mut members = Vec::new();
        for (name, property) in &object.properties {
            let required = object.is_required(name);
            if !required && !populate_all {
                continue;
            }
            let location = child_path(location, name);
            let out = if required {
                self.walk(property, Slot::Required, &location, depth + 1)?
            } else {
                self.walk_optional(property, &location, depth + 1)?
            };
            if let Some(out) = out {
                members.push((name.clone(), out));
            }
        }
        Ok(self.mode.object(members))
    }

    /// Walk a member that may be absent. A cycle through required members
    /// below it ends here when the mode has a stand-in for cycles.
    fn walk_optional(&mut self, schema: &Schema, location: &str, depth: u32) -> Result<Option<M::Out>, SchemaError> {
        match self.walk(schema, Slot::Optional, location, depth) {
            Err(err) if std::mem::take(&mut self.required_cycle) => match self.mode.on_cycle() {
                Some(out) => {
                    tracing::warn!(location, error = %err, "required cycle below optional member, not expanded");
                    Ok(Some(out))
                }
                None => Err(err),
            },
            other => other,
        }
    }
}

struct Generate<'r, R> {
    rng: &'r mut R,
}

impl<R: Rng> Mode for Generate<'_, R> {
    type Out = Value;

    fn primitive(&mut self, primitive: &Primitive, location: &str) -> Result<Value, SchemaError> {
        gen_primitive(primitive, &mut *self.rng, location)
    }

    fn all_properties(&self) -> bool {
        false
    }

    fn object(&mut self, members: Vec<(String, Value)>) -> Value {
        Value::Object(members.into_iter().collect())
    }

    fn array(&mut self, item: Option<Value>) -> Value {
        Value::Array(item.into_iter().collect())
    }

    fn on_cycle(&mut self) -> Option<Value> {
        None
    }

    fn choose_variants(&mut self, count: usize) -> Vec<usize> {
        vec![self.rng.gen_range(0..count)]
    }

    fn one_of(&mut self, outs: Vec<Value>) -> Option<Value> {
        outs.into_iter().next()
    }

    fn all_of(&mut self, outs: Vec<Value>) -> Value {
        if !outs.iter().all(Value::is_object) {
            // a scalar part (e.g. a referenced string) is the value itself
            return outs
                .into_iter()
                .find(|v| !v.is_object())
                .unwrap_or(Value::Null);
        }
        let mut merged = Map::new();
        for out in outs {
            if let Value::Object(members) = out {
                merged.extend(members);
            }
        }
        Value::Object(merged)
    }

    fn nullable(&mut self, inner: Value) -> Value {
        inner
    }
}

struct Expect;

impl Mode for Expect {
    type Out = Matcher;

    fn primitive(&mut self, primitive: &Primitive, _location: &str) -> Result<Matcher, SchemaError> {
        Ok(matcher_for(primitive))
    }

    fn all_properties(&self) -> bool {
        true
    }

    fn object(&mut self, members: Vec<(String, Matcher)>) -> Matcher {
        Matcher::Object(members)
    }

    fn array(&mut self, item: Option<Matcher>) -> Matcher {
        Matcher::Array(Box::new(item.unwrap_or(Matcher::Ignore)))
    }

    fn on_cycle(&mut self) -> Option<Matcher> {
        Some(Matcher::Ignore)
    }

    fn choose_variants(&mut self, count: usize) -> Vec<usize> {
        (0..count).collect()
    }

    fn one_of(&mut self, mut outs: Vec<Matcher>) -> Option<Matcher> {
        match outs.len() {
            0 => None,
            1 => outs.pop(),
            _ => Some(Matcher::AnyOf(outs)),
        }
    }

    fn all_of(&mut self, mut outs: Vec<Matcher>) -> Matcher {
        if outs.len() == 1 {
            return outs.remove(0);
        }
        if !outs.iter().all(|m| matches!(m, Matcher::Object(_))) {
            return Matcher::AllOf(outs);
        }
        let mut merged: Vec<(String, Matcher)> = Vec::new();
        for out in outs {
            let Matcher::Object(members) = out else {
                continue;
            };
            for (name, matcher) in members {
                match merged.iter_mut().find(|(n, _)| *n == name) {
                    Some(existing) => existing.1 = matcher,
                    None => merged.push((name, matcher)),
                }
            }
        }
        Matcher::Object(merged)
    }

    fn nullable(&mut self, inner: Matcher) -> Matcher {
        match inner {
            Matcher::Ignore => Matcher::Ignore,
            Matcher::AnyOf(mut variants) => {
                variants.push(Matcher::Literal(Value::Null));
                Matcher::AnyOf(variants)
            }
            other => Matcher::AnyOf(vec![other, Matcher::Literal(Value::Null)]),
        }
    }
}

fn matcher_for(primitive: &Primitive) -> Matcher {
    if !primitive.enumeration.is_empty() {
        return Matcher::OneOf(primitive.enumeration.clone());
    }
    let bounds = Bounds {
        minimum: primitive.minimum,
        maximum: primitive.maximum,
        exclusive_minimum: primitive.exclusive_minimum,
        exclusive_maximum: primitive.exclusive_maximum,
    };
    match primitive.kind {
        PrimitiveType::String => {
            if let Some(pattern) = &primitive.pattern {
                return Matcher::Pattern(pattern.clone());
            }
            match primitive.format.as_deref() {
                Some(
                    format @ ("date" | "date-time" | "time" | "uuid" | "email" | "uri" | "hostname"
                    | "ipv4" | "ipv6"),
                ) => Matcher::Format(format.to_string()),
                _ => Matcher::AnyString,
            }
        }
        PrimitiveType::Integer => Matcher::Integer(bounds),
        PrimitiveType::Number => Matcher::Number(bounds),
        PrimitiveType::Boolean => Matcher::AnyBoolean,
    }
}

fn gen_primitive(primitive: &Primitive, rng: &mut impl Rng, location: &str) -> Result<Value, SchemaError> {
    if !primitive.enumeration.is_empty() {
        let index = rng.gen_range(0..primitive.enumeration.len());
        return Ok(primitive.enumeration[index].clone());
    }
    match primitive.kind {
        PrimitiveType::String => gen_string(primitive, rng, location).map(Value::String),
        PrimitiveType::Integer => gen_integer(primitive, rng, location),
        PrimitiveType::Number => gen_number(primitive, rng, location),
        PrimitiveType::Boolean => Ok(Value::Bool(rng.gen_bool(0.5))),
    }
}

fn gen_string(primitive: &Primitive, rng: &mut impl Rng, location: &str) -> Result<String, SchemaError> {
    if let Some(pattern) = &primitive.pattern {
        return gen_pattern(pattern, rng, location);
    }
    let text = match primitive.format.as_deref() {
        Some("date") => gen_date(rng),
        Some("date-time") => format!("{}T{}", gen_date(rng), gen_time(rng)),
        Some("time") => gen_time(rng),
        Some("uuid") => format!(
            "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
            rng.r#gen::<u32>(),
            rng.r#gen::<u16>(),
            rng.r#gen::<u16>() & 0x0FFF,
            (rng.r#gen::<u16>() & 0x3FFF) | 0x8000,
            rng.r#gen::<u64>() & 0xFFFF_FFFF_FFFF,
        ),
        Some("email") => format!("user{}@example.com", rng.gen_range(1..9999_u32)),
        Some("uri" | "url") => format!("https://example.com/{}", random_alnum(rng, 8)),
        Some("hostname") => format!("{}.example.com", random_alnum(rng, 8).to_ascii_lowercase()),
        Some("ipv4") => format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..=223_u8),
            rng.r#gen::<u8>(),
            rng.r#gen::<u8>(),
            rng.gen_range(1..=254_u8)
        ),
        Some("ipv6") => (0..8)
            .map(|_| format!("{:x}", rng.r#gen::<u16>()))
            .collect::<Vec<_>>()
            .join(":"),
        // base64 alphabet, unpadded length
        Some("byte") => {
            let groups = rng.gen_range(1..=5);
            random_alnum(rng, groups * 4)
        }
        _ => {
            let (min, max) = string_length_range(primitive, location)?;
            let len = rng.gen_range(min..=max);
            random_alnum(rng, len)
        }
    };
    Ok(text)
}

fn string_length_range(primitive: &Primitive, location: &str) -> Result<(usize, usize), SchemaError> {
    let max = primitive
        .max_length
        .unwrap_or_else(|| DEFAULT_MAX_STRING_LEN.max(primitive.min_length.unwrap_or(0)))
        .min(MAX_STRING_LEN);
    let min = primitive.min_length.unwrap_or(1.min(max)).min(MAX_STRING_LEN);
    if min > max {
        return Err(SchemaError::unsupported(
            location,
            format!("minLength {min} exceeds maxLength {max}"),
        ));
    }
    Ok((min, max))
}

fn gen_date(rng: &mut impl Rng) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        rng.gen_range(2000..=2030),
        rng.gen_range(1..=12),
        rng.gen_range(1..=28)
    )
}

fn gen_time(rng: &mut impl Rng) -> String {
    format!(
        "{:02}:{:02}:{:02}Z",
        rng.gen_range(0..24),
        rng.gen_range(0..60),
        rng.gen_range(0..60)
    )
}

/// Generate a string fully matching `pattern`.
///
/// Anchors are stripped first: a full match satisfies both anchored and
/// unanchored patterns.
fn gen_pattern(pattern: &str, rng: &mut impl Rng, location: &str) -> Result<String, SchemaError> {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    let body = match body.strip_suffix('$') {
        Some(stripped) if !stripped.ends_with('\\') => stripped,
        _ => body,
    };
    let strategy = proptest::string::string_regex(body).map_err(|e| {
        SchemaError::unsupported(location, format!("pattern '{pattern}' cannot be generated: {e}"))
    })?;
    let seed: [u8; 32] = rng.r#gen();
    let mut runner = TestRunner::new_with_rng(
        RunnerConfig::default(),
        TestRng::from_seed(RngAlgorithm::ChaCha, &seed),
    );
    let tree = strategy.new_tree(&mut runner).map_err(|e| {
        SchemaError::unsupported(location, format!("pattern '{pattern}' cannot be generated: {e}"))
    })?;
    Ok(tree.current())
}

fn gen_integer(primitive: &Primitive, rng: &mut impl Rng, location: &str) -> Result<Value, SchemaError> {
    // Bounds saturate when cast; exclusive bounds move one step inward.
    let low = primitive.minimum.map(|m| {
        if primitive.exclusive_minimum {
            (m.floor() as i64).saturating_add(1)
        } else {
            m.ceil() as i64
        }
    });
    let high = primitive.maximum.map(|m| {
        if primitive.exclusive_maximum {
            (m.ceil() as i64).saturating_sub(1)
        } else {
            m.floor() as i64
        }
    });
    let (low, high) = match (low, high) {
        (Some(low), Some(high)) => (low, high),
        (Some(low), None) => (low, low.saturating_add(DEFAULT_INT_SPAN)),
        (None, Some(high)) if high >= DEFAULT_INT_MIN => (DEFAULT_INT_MIN, high),
        (None, Some(high)) => (high.saturating_sub(DEFAULT_INT_SPAN), high),
        (None, None) => (DEFAULT_INT_MIN, DEFAULT_INT_MIN + DEFAULT_INT_SPAN),
    };

    let Some(step) = primitive.multiple_of else {
        if low > high {
            return Err(empty_range(location, low, high));
        }
        return Ok(json!(rng.gen_range(low..=high)));
    };
    if step.fract() != 0.0 {
        return Err(SchemaError::unsupported(
            location,
            format!("integer with fractional multipleOf {step}"),
        ));
    }
    let step = step as i64;
    let first = low.div_euclid(step) + i64::from(low.rem_euclid(step) != 0);
    let last = high.div_euclid(step);
    if first > last {
        return Err(empty_range(location, low, high));
    }
    Ok(json!(rng.gen_range(first..=last).saturating_mul(step)))
}

fn gen_number(primitive: &Primitive, rng: &mut impl Rng, location: &str) -> Result<Value, SchemaError> {
    // A single declared bound spans at least its own magnitude, capped at the f64 range.
    let (mut low, mut high) = match (primitive.minimum, primitive.maximum) {
        (Some(min), Some(max)) => (min, max),
        (Some(min), None) => (min, (min + DEFAULT_NUMBER_SPAN.max(min.abs())).min(f64::MAX)),
        (None, Some(max)) => (
            (max - DEFAULT_NUMBER_SPAN.max(max.abs())).min(0.0).max(f64::MIN),
            max,
        ),
        (None, None) => (0.0, DEFAULT_NUMBER_SPAN),
    };
    if !low.is_finite() || !high.is_finite() {
        return Err(SchemaError::unsupported(
            location,
            format!("number bounds [{low}, {high}] are not finite"),
        ));
    }
    // at least one ulp of the larger bound, so an exclusive bound always moves
    let epsilon = (low.abs().max(high.abs()) * f64::EPSILON).max(f64::from_bits(1));
    if primitive.exclusive_minimum {
        low += epsilon;
    }
    if primitive.exclusive_maximum {
        high -= epsilon;
    }
    if !(low <= high) {
        return Err(empty_range(location, low, high));
    }

    if let Some(step) = primitive.multiple_of {
        // saturating casts keep the multiples inside [low, high]
        let first = (low / step).ceil() as i64;
        let last = (high / step).floor() as i64;
        if first > last {
            return Err(empty_range(location, low, high));
        }
        return Ok(json!(rng.gen_range(first..=last) as f64 * step));
    }
    let value = if high / 2.0 - low / 2.0 < f64::MAX / 4.0 {
        rng.gen_range(low..=high)
    } else {
        // the uniform sampler overflows on spans this wide: interpolate on halves
        let t: f64 = rng.r#gen();
        (low / 2.0 + t * (high / 2.0 - low / 2.0)) * 2.0
    };
    Ok(json!(value.clamp(low, high)))
}

fn empty_range(location: &str, low: impl std::fmt::Display, high: impl std::fmt::Display) -> SchemaError {
    SchemaError::unsupported(location, format!("no value satisfies bounds [{low}, {high}]"))
}

fn random_alnum(rng: &mut impl Rng, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
