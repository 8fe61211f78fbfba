//! The model file: the reactions, compartment changes, and direction rules
//! a simulation runs with.
//!
//! ```text
//! <numReaction> <numCompartmentChange> <numDirection:0|1>
//! for each reaction:
//!   <id> <numParam> <numIndexLevel> <level sizes...>
//!   <param values...>
//!   <index values, level by level...>
//! ...same records for each compartment change...
//! if numDirection == 1: a record for the update rule, then one for the
//! division rule.
//! ```

use std::io::Read;

use crate::compartment::create_compartment_change;
use crate::direction::Direction;
use crate::error::{ParseError, Result};
use crate::reaction::{create_reaction, ReactionSpec};
use crate::topology::Tissue;

use super::TokenStream;

/// Parsed model file, not yet instantiated.
#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    pub reactions: Vec<ReactionSpec>,
    pub compartment_changes: Vec<ReactionSpec>,
    pub direction: Option<(ReactionSpec, ReactionSpec)>,
}

/// Parses a model source.
///
/// # Errors
///
/// Returns a parse error with line context for malformed input.
pub fn read_model<R: Read>(mut reader: R) -> Result<ModelSpec> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(ParseError::Io)?;
    read_model_str(&text)
}

/// [`read_model`] over an in-memory string.
///
/// # Errors
///
/// See [`read_model`].
pub fn read_model_str(text: &str) -> Result<ModelSpec> {
    let mut tokens = TokenStream::new(text);

    let num_reactions = tokens.next_usize("reaction count")?;
    let num_changes = tokens.next_usize("compartment change count")?;
    let num_direction = tokens.next_usize("direction flag")?;
    if num_direction > 1 {
        return Err(ParseError::Malformed {
            line: tokens.line(),
            what: format!("direction flag {num_direction}, expected 0 or 1"),
        }
        .into());
    }

    let mut model = ModelSpec::default();
    for _ in 0..num_reactions {
        model.reactions.push(read_record(&mut tokens)?);
    }
    for _ in 0..num_changes {
        model.compartment_changes.push(read_record(&mut tokens)?);
    }
    if num_direction == 1 {
        let update = read_record(&mut tokens)?;
        let division = read_record(&mut tokens)?;
        model.direction = Some((update, division));
    }
    Ok(model)
}

/// Instantiates every entry of a parsed model and registers it with the
/// tissue.
///
/// # Errors
///
/// Returns the first construction failure (unknown id, bad parameter
/// count, bad index shape).
pub fn apply_model(tissue: &mut Tissue, model: &ModelSpec) -> Result<()> {
    for spec in &model.reactions {
        tissue.add_reaction(create_reaction(spec)?);
    }
    for spec in &model.compartment_changes {
        tissue.add_compartment_change(create_compartment_change(spec)?);
    }
    if let Some((update, division)) = &model.direction {
        tissue.set_direction(Direction::from_specs(update, division)?);
    }
    tracing::info!(
        reactions = model.reactions.len(),
        compartment_changes = model.compartment_changes.len(),
        direction = model.direction.is_some(),
        "model applied"
    );
    Ok(())
}

fn read_record(tokens: &mut TokenStream<'_>) -> Result<ReactionSpec> {
    let id = tokens.next_token("reaction id")?.to_string();
    let num_params = tokens.next_usize("parameter count")?;
    let num_levels = tokens.next_usize("index level count")?;
    let mut level_sizes = Vec::with_capacity(num_levels);
    for _ in 0..num_levels {
        level_sizes.push(tokens.next_usize("index level size")?);
    }

    let mut parameters = Vec::with_capacity(num_params);
    for _ in 0..num_params {
        parameters.push(tokens.next_f64("parameter value")?);
    }

    let mut indices = Vec::with_capacity(num_levels);
    for size in level_sizes {
        let mut level = Vec::with_capacity(size);
        for _ in 0..size {
            level.push(tokens.next_usize("index value")?);
        }
        indices.push(level);
    }

    Ok(ReactionSpec {
        id,
        parameters,
        indices,
    })
}
