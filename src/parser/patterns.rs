//! Mined pattern documents and their reduction to stripped shapes.
//!
//! The pattern miner omits the null pattern and single-function patterns
//! from its stored representations (a single-function pattern's id is just
//! its base function id). Stripping puts both back so every child id in the
//! resulting forest resolves to a shape.

use crate::shapes::{is_null_pattern, FunctionId, PatternId, StrippedPatternShape};
use crate::timeline::{Interval, Pattern, Program, Representation, Thread};
use crate::utils::config::{NULL_FUNCTION_ID, NULL_PATTERN_ID, PATTERN_BASE};
use crate::utils::error::ParseError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Top-level mined document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedDocument {
    pub program: MinedProgram,

    /// Function names indexed by function id
    #[serde(default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedProgram {
    /// Absolute timestamp of time 0, kept as a string to preserve precision
    #[serde(default)]
    pub absolute_start_time: String,

    pub duration: u64,

    pub threads: Vec<MinedThread>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinedThread {
    pub id: String,
    pub patterns: Vec<MinedPattern>,
}

/// One stored pattern: its shape and where it occurs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinedPattern {
    pub id: PatternId,
    pub representation: MinedShape,
    /// `[start, end]` pairs relative to program start
    pub intervals: Vec<[u64; 2]>,
}

/// Stored shape representation with occurrence counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedShape {
    pub depth: u32,
    pub base_functions: Vec<BaseFunctionCount>,
    pub pattern_ids: Vec<PatternIdCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseFunctionCount {
    pub base_function: FunctionId,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternIdCount {
    pub pattern_id: PatternId,
    pub count: u32,
}

/// Parse a mined document from a JSON string
pub fn parse_document(json: &str) -> Result<MinedDocument, ParseError> {
    let document: MinedDocument = serde_json::from_str(json)?;
    Ok(document)
}

/// Read a mined document from a JSON file
pub fn read_document(path: impl AsRef<Path>) -> Result<MinedDocument, ParseError> {
    let path = path.as_ref();
    debug!("Reading mined patterns from: {}", path.display());

    let file = File::open(path)?;
    let document: MinedDocument = serde_json::from_reader(BufReader::new(file))?;

    info!(
        "Loaded {} threads, {} patterns",
        document.program.threads.len(),
        document
            .program
            .threads
            .iter()
            .map(|t| t.patterns.len())
            .sum::<usize>()
    );
    Ok(document)
}

/// Shape entry before depths are resolved
struct PendingShape {
    base_function: FunctionId,
    pattern_ids: Vec<PatternId>,
    stored_depth: Option<u32>,
}

/// Strip a mined document into a forest of shapes
///
/// Every returned shape has a null-prefixed child list and a depth recomputed
/// from its children. The null shape is included. Shapes are sorted by id.
///
/// # Errors
/// * `ParseError::InvalidDocument` - a child id is neither stored nor a
///   single-function id, or references form a cycle
pub fn strip_shapes(document: &MinedDocument) -> Result<Vec<StrippedPatternShape>, ParseError> {
    let mut pending: BTreeMap<PatternId, PendingShape> = BTreeMap::new();

    for thread in &document.program.threads {
        for pattern in &thread.patterns {
            if is_null_pattern(pattern.id) || pending.contains_key(&pattern.id) {
                continue;
            }
            let representation = &pattern.representation;
            let base_function = representation
                .base_functions
                .first()
                .map(|b| b.base_function)
                .unwrap_or(NULL_FUNCTION_ID);
            let pattern_ids = std::iter::once(NULL_PATTERN_ID)
                .chain(representation.pattern_ids.iter().map(|p| p.pattern_id))
                .collect();
            pending.insert(
                pattern.id,
                PendingShape {
                    base_function,
                    pattern_ids,
                    stored_depth: Some(representation.depth),
                },
            );
        }
    }

    // Reintroduce single-function patterns referenced as children
    let referenced: Vec<(PatternId, PatternId)> = pending
        .iter()
        .flat_map(|(&parent, shape)| shape.pattern_ids.iter().map(move |&child| (parent, child)))
        .collect();
    for (parent, child) in referenced {
        if is_null_pattern(child) || pending.contains_key(&child) {
            continue;
        }
        if child >= PATTERN_BASE {
            return Err(ParseError::InvalidDocument(format!(
                "pattern {} references unknown pattern {}",
                parent, child
            )));
        }
        pending.insert(
            child,
            PendingShape {
                base_function: child as FunctionId,
                pattern_ids: vec![NULL_PATTERN_ID],
                stored_depth: None,
            },
        );
    }

    let mut depths: HashMap<PatternId, u32> = HashMap::new();
    depths.insert(NULL_PATTERN_ID, 0);
    let mut visiting = HashSet::new();
    for &id in pending.keys() {
        resolve_depth(id, &pending, &mut depths, &mut visiting)?;
    }

    let mut shapes = Vec::with_capacity(pending.len() + 1);
    shapes.push(StrippedPatternShape::null());
    for (id, shape) in pending {
        let depth = depths[&id];
        if let Some(stored) = shape.stored_depth {
            if stored != depth {
                debug!("Pattern {} stored depth {} recomputed as {}", id, stored, depth);
            }
        }
        shapes.push(StrippedPatternShape::new(
            id,
            depth,
            shape.base_function,
            shape.pattern_ids,
        ));
    }

    debug!("Stripped {} shapes (including null)", shapes.len());
    Ok(shapes)
}

/// Depth of `id` as 1 + deepest child, memoized
fn resolve_depth(
    id: PatternId,
    pending: &BTreeMap<PatternId, PendingShape>,
    depths: &mut HashMap<PatternId, u32>,
    visiting: &mut HashSet<PatternId>,
) -> Result<u32, ParseError> {
    if let Some(&depth) = depths.get(&id) {
        return Ok(depth);
    }
    if !visiting.insert(id) {
        return Err(ParseError::InvalidDocument(format!(
            "pattern {} is part of a reference cycle",
            id
        )));
    }

    let shape = pending
        .get(&id)
        .ok_or_else(|| ParseError::InvalidDocument(format!("unknown pattern {}", id)))?;
    let mut deepest_child = 0;
    for &child in &shape.pattern_ids {
        deepest_child = deepest_child.max(resolve_depth(child, pending, depths, visiting)?);
    }

    visiting.remove(&id);
    depths.insert(id, deepest_child + 1);
    Ok(deepest_child + 1)
}

/// Build the timeline program from a mined document and its stripped shapes
///
/// Each pattern is represented by its stripped shape and its intervals are
/// sorted by start time.
pub fn to_program(
    document: &MinedDocument,
    shapes: &[StrippedPatternShape],
) -> Result<Program, ParseError> {
    let by_id: HashMap<PatternId, &StrippedPatternShape> =
        shapes.iter().map(|shape| (shape.id, shape)).collect();

    let mut threads = Vec::with_capacity(document.program.threads.len());
    for mined_thread in &document.program.threads {
        let mut patterns = Vec::with_capacity(mined_thread.patterns.len());
        for mined in &mined_thread.patterns {
            let shape = by_id.get(&mined.id).ok_or_else(|| {
                ParseError::InvalidDocument(format!("pattern {} has no stripped shape", mined.id))
            })?;
            let mut intervals: Vec<Interval> = mined
                .intervals
                .iter()
                .map(|&[start, end]| Interval::new(start, end))
                .collect();
            intervals.sort_by_key(|interval| interval.start);
            patterns.push(Pattern {
                id: mined.id,
                representation: Representation::Shape((*shape).clone()),
                intervals,
            });
        }
        threads.push(Thread {
            id: mined_thread.id.clone(),
            patterns,
        });
    }

    Ok(Program {
        absolute_start_time: document.program.absolute_start_time.clone(),
        duration: document.program.duration,
        threads,
    })
}
