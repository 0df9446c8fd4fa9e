use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Guardrail,
    PreProcessing,
    Orchestration,
    PostProcessing,
    Failure,
    Other,
}

/// Structured trace emitted by the agent alongside completion chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub detail: String,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// A failure trace ends the turn; nothing useful follows it.
    pub fn is_terminal(&self) -> bool {
        self.kind == TraceKind::Failure
    }
}

/// Trace events of one turn grouped by label, each group in arrival order.
///
/// The agent evaluates guardrails on both sides of the model call, so the
/// first guardrail trace is filed as `preGuardrailTrace` and every later one
/// as `postGuardrailTrace`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLog {
    groups: BTreeMap<&'static str, Vec<String>>,
    seen_guardrail: bool,
}

impl TraceLog {
    pub fn record(&mut self, event: &TraceEvent) -> &'static str {
        let label = match event.kind {
            TraceKind::Guardrail if self.seen_guardrail => "postGuardrailTrace",
            TraceKind::Guardrail => {
                self.seen_guardrail = true;
                "preGuardrailTrace"
            }
            TraceKind::PreProcessing => "preProcessingTrace",
            TraceKind::Orchestration => "orchestrationTrace",
            TraceKind::PostProcessing => "postProcessingTrace",
            TraceKind::Failure => "failureTrace",
            TraceKind::Other => "otherTrace",
        };
        self.groups
            .entry(label)
            .or_default()
            .push(event.detail.clone());
        label
    }

    pub fn get(&self, label: &str) -> &[String] {
        self.groups.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
