//! Step registry: the table of step patterns and their handlers.
//!
//! The registry has two phases. While building, steps are added with
//! [`register`](StepRegistry::register). Once [`seal`](StepRegistry::seal) is
//! called no more steps may be added and phrases can be
//! [`resolve`](StepRegistry::resolve)d. A sealed registry is only ever read,
//! so it can be shared between concurrently running scenarios behind an `Arc`
//! (see [`Dispatcher`](crate::dispatcher::Dispatcher)).
//!
//! # Resolution
//!
//! A phrase is tried against every pattern. Among the patterns that match
//! with well-typed arguments, the most specific one wins (more literal
//! characters, then fewer placeholders); ties go to the earliest
//! registration, or are reported as [`ResolveError::AmbiguousMatch`] in strict
//! mode. When the phrase only fits a pattern's shape but an argument has the
//! wrong type (`I wait for abc seconds`), resolution fails with
//! [`ResolveError::ArgumentCoercion`] rather than [`ResolveError::NoMatch`].
//!
//! # Example
//!
//! ```
//! use appium_steps_core::context::ExecutionContext;
//! use appium_steps_core::outcome::StepError;
//! use appium_steps_core::registry::{handler_fn, StepArgs, StepMetadata, StepRegistry, StepTag};
//!
//! async fn wait(_ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
//!     let _seconds = args.int(0)?;
//!     Ok(())
//! }
//!
//! let mut registry = StepRegistry::new();
//! registry
//!     .register(
//!         "I wait for {int} seconds",
//!         handler_fn(|ctx, args| Box::pin(wait(ctx, args))),
//!         StepMetadata::new(StepTag::Navigation, "Wait for a number of seconds"),
//!     )
//!     .unwrap();
//! registry.seal();
//!
//! let resolved = registry.resolve("I wait for 3 seconds").unwrap();
//! assert_eq!(resolved.args.int(0).unwrap(), 3);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::outcome::StepError;
use crate::pattern::{CoercionError, CompiledPattern, PatternError, StepValue};

/// Errors raised while building the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identical pattern text is already registered.
    #[error("Step pattern already registered: '{pattern}'")]
    DuplicatePattern { pattern: String },

    /// The registry was sealed before this registration.
    #[error("Registry is sealed, cannot register '{pattern}'")]
    RegistryClosed { pattern: String },

    #[error("Invalid step pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

/// Errors raised while resolving a phrase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Registry must be sealed before resolving steps")]
    NotSealed,

    #[error("No step matches '{phrase}'")]
    NoMatch { phrase: String },

    #[error("'{phrase}' matches several steps: {}", .patterns.join(" | "))]
    AmbiguousMatch { phrase: String, patterns: Vec<String> },

    #[error("'{phrase}' matches '{pattern}' but {source}")]
    ArgumentCoercion {
        phrase: String,
        pattern: String,
        #[source]
        source: CoercionError,
    },
}

/// Category of a step, used for grouping in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepTag {
    Navigation,
    Interaction,
    Assertion,
    Gesture,
    Input,
}

impl StepTag {
    pub const ALL: [StepTag; 5] = [
        StepTag::Navigation,
        StepTag::Interaction,
        StepTag::Input,
        StepTag::Gesture,
        StepTag::Assertion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepTag::Navigation => "navigation",
            StepTag::Interaction => "interaction",
            StepTag::Assertion => "assertion",
            StepTag::Gesture => "gesture",
            StepTag::Input => "input",
        }
    }
}

impl fmt::Display for StepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Unknown tag '{}'. Use: navigation, interaction, input, gesture, assertion",
                    s
                )
            })
    }
}

/// Human-facing description of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub tag: StepTag,
    pub description: String,
    /// Example phrases, without the Gherkin keyword.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl StepMetadata {
    pub fn new(tag: StepTag, description: impl Into<String>) -> Self {
        Self {
            tag,
            description: description.into(),
            examples: Vec::new(),
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

/// Identifier of a registered step, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub usize);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed arguments extracted from a phrase, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs(Vec<StepValue>);

impl StepArgs {
    pub fn new(values: Vec<StepValue>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepValue> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[StepValue] {
        &self.0
    }

    pub fn string(&self, index: usize) -> Result<&str, StepError> {
        self.get(index)
            .and_then(StepValue::as_str)
            .ok_or(StepError::MissingArgument { index, expected: "string" })
    }

    pub fn int(&self, index: usize) -> Result<i64, StepError> {
        self.get(index)
            .and_then(StepValue::as_int)
            .ok_or(StepError::MissingArgument { index, expected: "int" })
    }

    pub fn float(&self, index: usize) -> Result<f64, StepError> {
        self.get(index)
            .and_then(StepValue::as_float)
            .ok_or(StepError::MissingArgument { index, expected: "float" })
    }
}

impl From<Vec<StepValue>> for StepArgs {
    fn from(values: Vec<StepValue>) -> Self {
        Self(values)
    }
}

/// Boxed future returned by closure handlers.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send + 'a>>;

/// The code run for a matched step.
///
/// Implemented for every `Fn(&mut ExecutionContext, StepArgs) -> StepFuture`;
/// wrap closures in [`handler_fn`] so their signature is inferred.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn call(&self, ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError>;
}

#[async_trait]
impl<F> StepHandler for F
where
    F: for<'a> Fn(&'a mut ExecutionContext, StepArgs) -> StepFuture<'a> + Send + Sync,
{
    async fn call(&self, ctx: &mut ExecutionContext, args: StepArgs) -> Result<(), StepError> {
        (self)(ctx, args).await
    }
}

/// Pins down the higher-ranked signature of a handler closure.
pub fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut ExecutionContext, StepArgs) -> StepFuture<'a> + Send + Sync + 'static,
{
    f
}

/// A pattern, its handler and metadata.
pub struct Registration {
    id: StepId,
    pattern: CompiledPattern,
    handler: Arc<dyn StepHandler>,
    metadata: StepMetadata,
}

impl Registration {
    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn StepHandler> {
        &self.handler
    }

    pub fn metadata(&self) -> &StepMetadata {
        &self.metadata
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("pattern", &self.pattern.source())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A successful resolution.
#[derive(Debug)]
pub struct Resolved<'r> {
    pub registration: &'r Registration,
    pub args: StepArgs,
}

/// Two equally specific patterns that may match the same phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    /// The earlier registration, which wins outside strict mode.
    pub winner: String,
    pub shadowed: String,
}

/// The step table.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Registration>,
    overlaps: Vec<Overlap>,
    sealed: bool,
    strict: bool,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step.
    ///
    /// Fails without changing the registry if the pattern does not compile,
    /// is already registered, or the registry is sealed. An equally specific
    /// pattern that may match the same phrases is accepted with a warning.
    pub fn register<H>(
        &mut self,
        pattern: &str,
        handler: H,
        metadata: StepMetadata,
    ) -> Result<StepId, RegistryError>
    where
        H: StepHandler + 'static,
    {
        if self.sealed {
            return Err(RegistryError::RegistryClosed {
                pattern: pattern.to_string(),
            });
        }
        let compiled =
            CompiledPattern::compile(pattern).map_err(|source| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        if self.steps.iter().any(|s| s.pattern.source() == pattern) {
            return Err(RegistryError::DuplicatePattern {
                pattern: pattern.to_string(),
            });
        }

        for existing in &self.steps {
            if existing.pattern.specificity() == compiled.specificity()
                && existing.pattern.may_overlap(&compiled)
            {
                warn!(
                    winner = existing.pattern.source(),
                    shadowed = pattern,
                    "equally specific step patterns may match the same phrase"
                );
                self.overlaps.push(Overlap {
                    winner: existing.pattern.source().to_string(),
                    shadowed: pattern.to_string(),
                });
            }
        }

        let id = StepId(self.steps.len());
        self.steps.push(Registration {
            id,
            pattern: compiled,
            handler: Arc::new(handler),
            metadata,
        });
        Ok(id)
    }

    /// Ends the build phase.
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(steps = self.steps.len(), "step registry sealed");
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// In strict mode equally specific matches are an error instead of
    /// resolving to the earliest registration.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registrations in registration order.
    pub fn registrations(&self) -> &[Registration] {
        &self.steps
    }

    pub fn get(&self, id: StepId) -> Option<&Registration> {
        self.steps.get(id.0)
    }

    /// Overlapping pattern pairs detected at registration.
    pub fn ambiguities(&self) -> &[Overlap] {
        &self.overlaps
    }

    /// Finds the step for a phrase (without Gherkin keyword).
    pub fn resolve(&self, phrase: &str) -> Result<Resolved<'_>, ResolveError> {
        if !self.sealed {
            return Err(ResolveError::NotSealed);
        }

        let mut typed: Vec<(&Registration, Vec<StepValue>)> = Vec::new();
        let mut coercion: Option<(&Registration, CoercionError)> = None;

        for reg in &self.steps {
            if let Some(values) = reg.pattern.matches(phrase) {
                typed.push((reg, values));
            } else if let Some(raw) = reg.pattern.capture(phrase) {
                // `matches` already tried every typed segmentation.
                if let Err(err) = reg.pattern.coerce(&raw) {
                    let better = coercion.as_ref().map_or(true, |(best, _)| {
                        reg.pattern.specificity() > best.pattern.specificity()
                    });
                    if better {
                        coercion = Some((reg, err));
                    }
                }
            }
        }

        let Some(best) = typed.iter().map(|(reg, _)| reg.pattern.specificity()).max() else {
            return Err(match coercion {
                Some((reg, source)) => ResolveError::ArgumentCoercion {
                    phrase: phrase.to_string(),
                    pattern: reg.pattern.source().to_string(),
                    source,
                },
                None => ResolveError::NoMatch {
                    phrase: phrase.to_string(),
                },
            });
        };

        let mut top = typed
            .into_iter()
            .filter(|(reg, _)| reg.pattern.specificity() == best)
            .collect::<Vec<_>>();

        if self.strict && top.len() > 1 {
            return Err(ResolveError::AmbiguousMatch {
                phrase: phrase.to_string(),
                patterns: top
                    .iter()
                    .map(|(reg, _)| reg.pattern.source().to_string())
                    .collect(),
            });
        }

        let (registration, values) = top.swap_remove(0);
        Ok(Resolved {
            registration,
            args: StepArgs::new(values),
        })
    }
}
