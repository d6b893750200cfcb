use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info, info_span, trace, warn};

use crate::{
    locate, parse_class, patch, serialize, Fingerprint, InstructionTarget, MethodShape, Opcode,
    Overrides, ProcessOverrides, TransformError,
};

/// Everything needed to find and rewrite one literal in one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchPlan {
    pub fingerprint: Fingerprint,
    pub method: MethodShape,
    pub target: InstructionTarget,
    pub default_replacement: i64,
}

impl PatchPlan {
    /// Raises the number of stars the level renderer scatters over the sky
    /// from 1500 to 30000.
    pub fn star_field() -> Self {
        PatchPlan {
            fingerprint: Fingerprint::level_renderer(),
            method: MethodShape::private_unary_unpackaged(),
            target: InstructionTarget {
                opcode: Opcode::Sipush,
                operand: 1500,
            },
            default_replacement: 30000,
        }
    }
}

/// The class-load hook. Holds no mutable state, so one instance can serve
/// every class-loading thread at once.
#[derive(Clone, Debug)]
pub struct Transformer<O = ProcessOverrides> {
    plan: PatchPlan,
    overrides: O,
}

impl Transformer<ProcessOverrides> {
    /// The star field plan with overrides read from the process environment.
    pub fn star_field(overrides: ProcessOverrides) -> Self {
        Transformer::new(PatchPlan::star_field(), overrides)
    }
}

impl<O: Overrides> Transformer<O> {
    pub fn new(plan: PatchPlan, overrides: O) -> Self {
        Transformer { plan, overrides }
    }

    pub fn plan(&self) -> &PatchPlan {
        &self.plan
    }

    /// Runs the whole pipeline, reporting why nothing was patched. Only
    /// returns `Ok` when at least one instruction was rewritten.
    pub fn try_transform(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut class = parse_class(bytes)?;
        self.plan.fingerprint.check(&class)?;
        info!("located {}", self.plan.fingerprint.label);

        let index = match locate(&class, &self.plan.method) {
            Some((index, _)) => index,
            None => {
                return Err(TransformError::MethodNotFound {
                    shape: self.plan.method.to_string(),
                })
            }
        };

        let method = &mut class.methods[index];
        let result = patch(method, &self.plan.target, || self.overrides.resolve(self.plan.default_replacement))?;
        if !result.applied {
            return Err(TransformError::NotLocated {
                method: method.name.to_string(),
                target: self.plan.target.to_string(),
            });
        }

        let patched = serialize(&class);
        // A class the loader rejects is worse than one left alone.
        if let Err(e) = parse_class(&patched) {
            return Err(TransformError::UnexpectedInternal(format!("patched class does not parse: {}", e)));
        }
        Ok(patched)
    }

    /// The class-load boundary: returns the patched class, or `bytes` itself
    /// whenever anything at all goes wrong. Never panics.
    ///
    /// `class_name` is only used for diagnostics.
    pub fn transform<'b>(&self, class_name: &str, bytes: &'b [u8]) -> Cow<'b, [u8]> {
        let span = info_span!("transform", class = class_name);
        let _entered = span.enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_transform(bytes)))
            .unwrap_or_else(|payload| Err(TransformError::UnexpectedInternal(panic_message(payload.as_ref()))));

        match outcome {
            Ok(patched) => {
                info!("patched {} bytes", patched.len());
                Cow::Owned(patched)
            }
            Err(e) => {
                report(&e);
                Cow::Borrowed(bytes)
            }
        }
    }
}

/// Routes panic reports through `tracing` instead of the default hook's stderr
/// output. [`Transformer::transform`] survives panics either way, but only this
/// keeps their diagnostics in the installed subscriber. The hook is process
/// wide, so embedders call this once at startup.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        error!(location = %location, "panicked: {}", panic_message(info.payload()));
    }));
}

fn report(e: &TransformError) {
    match e {
        TransformError::NoStructuralMatch { .. } | TransformError::NoContentMatch { .. } => trace!("{}", e),
        TransformError::Parse(_) => debug!("unchanged: {}", e),
        TransformError::MethodNotFound { .. } | TransformError::NotLocated { .. } => warn!("{}", e),
        TransformError::OperandOutOfRange { .. } | TransformError::InvalidOverride { .. } => {
            error!("configuration error, class left unchanged: {}", e)
        }
        TransformError::UnexpectedInternal(_) => error!("transform failed, class left unchanged: {}", e),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
